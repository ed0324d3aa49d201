use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::index::{IndexHandle, SearchIndex};
use crate::models::{Facets, SearchAnalytics, SearchFilters, SearchResults, Suggestion};
use crate::services::{autocomplete, facets, filters, fuzzy, ranker};
use catalog_core::models::HealthStatus;
use catalog_core::{retry_read_once, Cache, CacheExt, CatalogStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

const CACHE_PREFIX: &str = "search:";
const RESULTS_KEY: &str = "search:results:";
const FACETS_KEY: &str = "search:facets:";
const AUTOCOMPLETE_KEY: &str = "search:autocomplete:";

/// Search surface: fuzzy match -> filter -> rank -> paginate over the
/// atomically swapped in-memory index, with cached results and
/// fire-and-forget query analytics.
pub struct SearchService {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    config: SearchConfig,
    index: IndexHandle,
}

impl SearchService {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<dyn Cache>, config: SearchConfig) -> Self {
        Self {
            store,
            cache,
            config,
            index: IndexHandle::new(),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        user_id: Option<Uuid>,
        limit: usize,
        offset: usize,
    ) -> Result<SearchResults> {
        self.validate_limit(limit)?;
        filters::validate(filters)?;

        let normalized = fuzzy::normalize(query);
        let started = Instant::now();

        // A non-empty query that normalizes below the minimum length returns
        // empty; a genuinely empty query browses the whole catalog instead.
        if !normalized.is_empty() && normalized.chars().count() < self.config.min_query_len {
            return Ok(SearchResults {
                results: Vec::new(),
                total: 0,
                analytics: self.analytics(query, &normalized, 0, started),
            });
        }

        let cache_key = format!(
            "{}{:x}",
            RESULTS_KEY,
            md5::compute(self.results_cache_seed(&normalized, filters, limit, offset)?)
        );
        match self.cache.get_json::<SearchResults>(&cache_key).await {
            Ok(Some(results)) => return Ok(results),
            Ok(None) => {}
            Err(e) => warn!("search cache read failed: {}", e),
        }

        let index = self.index_snapshot().await?;
        let matched = self.matched_entries(&index, &normalized, filters);

        let scored: Vec<(usize, f64)> = matched
            .into_iter()
            .map(|(idx, relevance)| {
                let score =
                    ranker::composite_score(relevance, &index.entries[idx], &normalized, filters);
                (idx, score)
            })
            .collect();
        let (page, total) = ranker::rank_and_paginate(scored, offset, limit);

        let results = SearchResults {
            results: page
                .into_iter()
                .map(|idx| index.entries[idx].item.clone())
                .collect(),
            total,
            analytics: self.analytics(query, &normalized, total, started),
        };

        info!(
            query = %normalized,
            user_id = ?user_id,
            total,
            returned = results.results.len(),
            "search executed"
        );

        if !normalized.is_empty() {
            self.record_query(&normalized);
        }

        if let Err(e) = self
            .cache
            .set_json(
                &cache_key,
                &results,
                Duration::from_secs(self.config.results_ttl_secs),
            )
            .await
        {
            warn!("search cache write failed: {}", e);
        }

        Ok(results)
    }

    pub async fn get_facets(&self, query: &str, filters: &SearchFilters) -> Result<Facets> {
        filters::validate(filters)?;
        let normalized = fuzzy::normalize(query);

        // Facets describe the result set, so the short-query rule applies
        // here too: a query `search` answers with nothing gets empty counts.
        if !normalized.is_empty() && normalized.chars().count() < self.config.min_query_len {
            return Ok(Facets::default());
        }

        let cache_key = format!(
            "{}{:x}",
            FACETS_KEY,
            md5::compute(self.results_cache_seed(&normalized, filters, 0, 0)?)
        );
        match self.cache.get_json::<Facets>(&cache_key).await {
            Ok(Some(facets)) => return Ok(facets),
            Ok(None) => {}
            Err(e) => warn!("facet cache read failed: {}", e),
        }

        let index = self.index_snapshot().await?;
        let matched = self.matched_entries(&index, &normalized, filters);
        let entries: Vec<&crate::index::IndexEntry> =
            matched.iter().map(|(idx, _)| &index.entries[*idx]).collect();
        let facets = facets::compute(&entries);

        if let Err(e) = self
            .cache
            .set_json(
                &cache_key,
                &facets,
                Duration::from_secs(self.config.facets_ttl_secs),
            )
            .await
        {
            warn!("facet cache write failed: {}", e);
        }

        Ok(facets)
    }

    pub async fn get_autocomplete(&self, fragment: &str, limit: usize) -> Result<Vec<Suggestion>> {
        self.validate_limit(limit)?;

        let normalized = fuzzy::normalize(fragment);
        if normalized.chars().count() < self.config.min_query_len {
            return Ok(Vec::new());
        }

        let cache_key = format!(
            "{}{:x}",
            AUTOCOMPLETE_KEY,
            md5::compute(format!("{}|{}", normalized, limit))
        );
        match self.cache.get_json::<Vec<Suggestion>>(&cache_key).await {
            Ok(Some(suggestions)) => return Ok(suggestions),
            Ok(None) => {}
            Err(e) => warn!("autocomplete cache read failed: {}", e),
        }

        let index = self.index_snapshot().await?;
        let history = match self
            .store
            .popular_queries(&normalized, self.config.popular_query_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!("popular query lookup failed: {}", e);
                Vec::new()
            }
        };

        let suggestions = autocomplete::suggestions(&index, &history, &normalized, limit);

        if let Err(e) = self
            .cache
            .set_json(
                &cache_key,
                &suggestions,
                Duration::from_secs(self.config.autocomplete_ttl_secs),
            )
            .await
        {
            warn!("autocomplete cache write failed: {}", e);
        }

        Ok(suggestions)
    }

    /// Full rebuild: construct off to the side, publish atomically, then
    /// clear every downstream search cache. Returns the new entry count.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let items = retry_read_once("all_items", || self.store.all_items()).await?;
        let index = SearchIndex::build(items);
        let entries = index.len();
        self.index.publish(index);
        self.refresh_caches().await?;
        info!(entries, "search index rebuilt");
        Ok(entries)
    }

    pub async fn refresh_caches(&self) -> Result<()> {
        self.cache.delete_prefix(CACHE_PREFIX).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        let mut details = BTreeMap::new();
        let store_ok = match self.store.ping().await {
            Ok(()) => {
                details.insert("store".to_string(), "ok".to_string());
                true
            }
            Err(e) => {
                details.insert("store".to_string(), e.to_string());
                false
            }
        };
        let cache_ok = match self.cache.ping().await {
            Ok(()) => {
                details.insert("cache".to_string(), "ok".to_string());
                true
            }
            Err(e) => {
                details.insert("cache".to_string(), e.to_string());
                false
            }
        };
        let index_detail = match self.index.snapshot() {
            Some(index) => format!("{} entries", index.len()),
            None => "not built".to_string(),
        };
        details.insert("index".to_string(), index_detail);

        HealthStatus {
            status: if store_ok && cache_ok {
                "ok".to_string()
            } else {
                "degraded".to_string()
            },
            details,
        }
    }

    /// Indices of entries passing the fuzzy floor and every filter, paired
    /// with their relevance (the browse baseline when no query was given).
    fn matched_entries(
        &self,
        index: &SearchIndex,
        normalized: &str,
        search_filters: &SearchFilters,
    ) -> Vec<(usize, f64)> {
        index
            .entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let relevance = if normalized.is_empty() {
                    self.config.browse_baseline
                } else {
                    let relevance = fuzzy::relevance(normalized, entry);
                    if relevance < self.config.similarity_floor {
                        return None;
                    }
                    relevance
                };
                if !filters::matches(entry, search_filters) {
                    return None;
                }
                Some((idx, relevance))
            })
            .collect()
    }

    /// Missing index triggers one synchronous rebuild; a second miss
    /// surfaces as service-unavailable.
    async fn index_snapshot(&self) -> Result<Arc<SearchIndex>> {
        if let Some(index) = self.index.snapshot() {
            return Ok(index);
        }
        warn!("search index missing, rebuilding synchronously");
        self.rebuild_index()
            .await
            .map_err(|_| SearchError::IndexUnavailable)?;
        self.index.snapshot().ok_or(SearchError::IndexUnavailable)
    }

    fn validate_limit(&self, limit: usize) -> Result<()> {
        if limit == 0 || limit > self.config.max_limit {
            return Err(SearchError::Validation(format!(
                "limit must be between 1 and {}",
                self.config.max_limit
            )));
        }
        Ok(())
    }

    fn results_cache_seed(
        &self,
        normalized: &str,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
    ) -> Result<String> {
        let filters_json = serde_json::to_string(filters).map_err(anyhow::Error::from)?;
        Ok(format!(
            "{}|{}|{}|{}",
            normalized, filters_json, limit, offset
        ))
    }

    fn analytics(
        &self,
        query: &str,
        normalized: &str,
        result_count: usize,
        started: Instant,
    ) -> SearchAnalytics {
        SearchAnalytics {
            query: query.to_string(),
            normalized_query: normalized.to_string(),
            result_count,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Fire-and-forget analytics row; failures are logged, never surfaced.
    fn record_query(&self, normalized: &str) {
        let store = self.store.clone();
        let query = normalized.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.record_search_query(&query).await {
                warn!(query = %query, "search analytics write failed: {}", e);
            }
        });
    }
}
