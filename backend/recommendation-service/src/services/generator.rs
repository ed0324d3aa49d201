use crate::config::RecommendationConfig;
use crate::error::{RecommendationError, Result};
use crate::models::{Candidate, SimilarUser};
use crate::services::diversity::DiversityFilter;
use crate::services::experiment::{fallback_variant, ExperimentService};
use crate::services::profile::ProfileBuilder;
use crate::services::similarity::{jaccard_str, ItemSimilarityEngine, UserSimilarityEngine};
use crate::services::trending::TrendingEngine;
use catalog_core::models::{
    AlgorithmKind, CatalogItem, ExperimentVariant, HealthStatus, RankingStrategy, ReasonKind,
    Recommendation, UserProfile,
};
use catalog_core::{retry_read_once, Cache, CacheExt, CatalogStore};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub(crate) const RECS_KEY: &str = "user:recommendations:";

const GRADE_WEIGHT: f64 = 0.3;
const FLAVOR_WEIGHT: f64 = 0.4;
const PRICE_WEIGHT: f64 = 0.2;
const ORIGIN_WEIGHT: f64 = 0.1;
const FACTOR_COUNT: f64 = 4.0;

/// Recommendation generation pipeline:
/// cold start -> strategy select -> candidate gather -> diversity filter ->
/// freshness inject -> rank -> persist.
pub struct RecommendationService {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    config: RecommendationConfig,
    experiments: ExperimentService,
    profiles: ProfileBuilder,
    user_similarity: UserSimilarityEngine,
    item_similarity: ItemSimilarityEngine,
    trending: TrendingEngine,
    diversity: DiversityFilter,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<dyn Cache>,
        config: RecommendationConfig,
    ) -> Self {
        let experiments = ExperimentService::new(store.clone(), config.clone());
        let profiles = ProfileBuilder::new(store.clone(), cache.clone(), config.clone());
        let user_similarity =
            UserSimilarityEngine::new(store.clone(), cache.clone(), config.clone());
        let item_similarity =
            ItemSimilarityEngine::new(store.clone(), cache.clone(), config.clone());
        let trending = TrendingEngine::new(store.clone(), config.clone());
        let diversity = DiversityFilter::new(
            config.grade_cap,
            config.origin_cap,
            config.diversity_floor,
        );

        Self {
            store,
            cache,
            config,
            experiments,
            profiles,
            user_similarity,
            item_similarity,
            trending,
            diversity,
        }
    }

    pub async fn generate_recommendations(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        if limit == 0 || limit > self.config.max_limit {
            return Err(RecommendationError::Validation(format!(
                "limit must be between 1 and {}",
                self.config.max_limit
            )));
        }

        let cache_key = format!("{}{}:{}", RECS_KEY, user_id, limit);
        match self.cache.get_json::<Vec<Recommendation>>(&cache_key).await {
            Ok(Some(recs)) => return Ok(recs),
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, "recommendation cache read failed: {}", e),
        }

        let variant = match self.experiments.assign_variant(user_id).await {
            Ok(variant) => variant,
            Err(e) => {
                warn!(user_id = %user_id, "variant assignment failed, using hybrid 0.5: {}", e);
                fallback_variant()
            }
        };

        let profile = self.profiles.build(user_id).await?;
        let neighbors = match self.user_similarity.similar_users(user_id).await {
            Ok(neighbors) => neighbors,
            Err(e) => {
                warn!(user_id = %user_id, "user similarity unavailable: {}", e);
                Vec::new()
            }
        };

        // Cold start: no history and no neighbors skips straight to trending.
        if profile.is_cold() && neighbors.is_empty() {
            let recs = self.trending_fallback(user_id, limit, &variant).await?;
            self.cache_results(&cache_key, &recs).await;
            return Ok(recs);
        }

        let touched = self.touched_items(user_id).await?;

        let (algorithm, mut candidates) = match variant.strategy {
            RankingStrategy::Collaborative => {
                let scores = self.gather_collaborative(&neighbors, &touched).await;
                let candidates = self.collaborative_candidates(scores).await?;
                (AlgorithmKind::Collaborative, candidates)
            }
            RankingStrategy::ContentBased => {
                let catalog = self.catalog().await?;
                let candidates = self.content_candidates(&profile, &catalog, &touched);
                (AlgorithmKind::ContentBased, candidates)
            }
            RankingStrategy::Hybrid {
                collaborative_weight,
            } => {
                let catalog = self.catalog().await?;
                let collab = self.gather_collaborative(&neighbors, &touched).await;
                let content = self.content_candidates(&profile, &catalog, &touched);
                let merged = self
                    .merge_hybrid(collab, content, collaborative_weight)
                    .await?;
                (AlgorithmKind::Hybrid, merged)
            }
        };

        // A personalized pipeline can still come up empty (e.g. the user has
        // touched the whole relevant catalog); fall back rather than return
        // nothing.
        if candidates.is_empty() {
            let recs = self.trending_fallback(user_id, limit, &variant).await?;
            self.cache_results(&cache_key, &recs).await;
            return Ok(recs);
        }

        candidates = self.diversity.apply(candidates, limit);
        self.inject_freshness(&mut candidates, &touched).await;

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        let recs = self
            .persist_batch(user_id, candidates, algorithm, &variant)
            .await;
        info!(
            user_id = %user_id,
            algorithm = algorithm.as_str(),
            variant = %variant.id,
            count = recs.len(),
            "generated recommendations"
        );

        self.cache_results(&cache_key, &recs).await;
        Ok(recs)
    }

    /// Standalone "similar products" query.
    pub async fn get_similar_items(
        &self,
        item_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CatalogItem>> {
        if limit == 0 || limit > self.config.max_limit {
            return Err(RecommendationError::Validation(format!(
                "limit must be between 1 and {}",
                self.config.max_limit
            )));
        }
        self.item_similarity.similar_items(item_id, limit).await
    }

    pub async fn health_check(&self) -> HealthStatus {
        let mut details = std::collections::BTreeMap::new();
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

        HealthStatus {
            status: if store_ok && cache_ok {
                "ok".to_string()
            } else {
                "degraded".to_string()
            },
            details,
        }
    }

    async fn trending_fallback(
        &self,
        user_id: Uuid,
        limit: usize,
        variant: &ExperimentVariant,
    ) -> Result<Vec<Recommendation>> {
        let trending = self.trending.trending(limit).await?;
        let candidates: Vec<Candidate> = trending
            .into_iter()
            .map(|(item, score)| Candidate {
                item,
                score,
                reason: ReasonKind::Trending,
                explanation: "popular with shoppers this week".to_string(),
            })
            .collect();

        info!(
            user_id = %user_id,
            count = candidates.len(),
            "serving trending fallback"
        );
        Ok(self
            .persist_batch(user_id, candidates, AlgorithmKind::Trending, variant)
            .await)
    }

    /// Score contributions from similar users' interactions with items the
    /// target never touched, normalized by the count of neighbors whose
    /// history was actually readable.
    async fn gather_collaborative(
        &self,
        neighbors: &[SimilarUser],
        touched: &HashSet<Uuid>,
    ) -> HashMap<Uuid, f64> {
        let mut scores: HashMap<Uuid, f64> = HashMap::new();
        let mut contributing = 0usize;

        for neighbor in neighbors {
            let events = match self
                .store
                .recent_interactions(neighbor.user_id, self.config.history_limit)
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    warn!(neighbor = %neighbor.user_id, "neighbor history unavailable: {}", e);
                    continue;
                }
            };
            contributing += 1;
            for event in events {
                if touched.contains(&event.item_id) {
                    continue;
                }
                *scores.entry(event.item_id).or_insert(0.0) +=
                    neighbor.similarity * event.kind.weight();
            }
        }

        if contributing == 0 {
            return scores;
        }
        let divisor = contributing as f64;
        for score in scores.values_mut() {
            *score /= divisor;
        }
        scores
    }

    async fn collaborative_candidates(
        &self,
        scores: HashMap<Uuid, f64>,
    ) -> Result<Vec<Candidate>> {
        let ids: Vec<Uuid> = scores.keys().copied().collect();
        let items = self.store.items(&ids).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let score = scores.get(&item.id).copied().unwrap_or(0.0);
                Candidate {
                    item,
                    score,
                    reason: ReasonKind::SimilarUsers,
                    explanation: "liked by similar users".to_string(),
                }
            })
            .collect())
    }

    /// Profile-vs-item content scoring over the in-stock catalog, with a
    /// floor below which candidates are discarded.
    fn content_candidates(
        &self,
        profile: &UserProfile,
        catalog: &[CatalogItem],
        touched: &HashSet<Uuid>,
    ) -> Vec<Candidate> {
        catalog
            .iter()
            .filter(|item| item.in_stock && !touched.contains(&item.id))
            .filter_map(|item| {
                let (score, reasons) = profile_item_score(profile, item);
                if score > self.config.content_score_floor {
                    Some(Candidate {
                        item: item.clone(),
                        score,
                        reason: ReasonKind::ProfileMatch,
                        explanation: reasons.join(", "),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Hybrid blend: items in both lists score exactly
    /// `collab*w + content*(1-w)`; single-list items are scaled by their
    /// list's share.
    async fn merge_hybrid(
        &self,
        collab: HashMap<Uuid, f64>,
        content: Vec<Candidate>,
        w: f64,
    ) -> Result<Vec<Candidate>> {
        let mut merged: Vec<Candidate> = Vec::new();
        let mut content_ids: HashSet<Uuid> = HashSet::new();

        for candidate in content {
            content_ids.insert(candidate.item.id);
            match collab.get(&candidate.item.id) {
                Some(collab_score) => merged.push(Candidate {
                    score: collab_score * w + candidate.score * (1.0 - w),
                    reason: ReasonKind::Hybrid,
                    explanation: format!("liked by similar users; {}", candidate.explanation),
                    item: candidate.item,
                }),
                None => merged.push(Candidate {
                    score: candidate.score * (1.0 - w),
                    ..candidate
                }),
            }
        }

        let collab_only: Vec<Uuid> = collab
            .keys()
            .filter(|id| !content_ids.contains(id))
            .copied()
            .collect();
        let items = self.store.items(&collab_only).await?;
        for item in items {
            let score = collab.get(&item.id).copied().unwrap_or(0.0) * w;
            merged.push(Candidate {
                item,
                score,
                reason: ReasonKind::SimilarUsers,
                explanation: "liked by similar users".to_string(),
            });
        }

        Ok(merged)
    }

    /// Appends up to `freshness_slots` recently added items at a fixed score.
    async fn inject_freshness(&self, candidates: &mut Vec<Candidate>, touched: &HashSet<Uuid>) {
        let catalog = match self.catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("freshness injection skipped, catalog unavailable: {}", e);
                return;
            }
        };

        let present: HashSet<Uuid> = candidates.iter().map(|c| c.item.id).collect();
        let cutoff = Utc::now() - ChronoDuration::days(self.config.freshness_window_days);

        let mut fresh: Vec<&CatalogItem> = catalog
            .iter()
            .filter(|item| {
                item.created_at >= cutoff
                    && !present.contains(&item.id)
                    && !touched.contains(&item.id)
            })
            .collect();
        fresh.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        for item in fresh.into_iter().take(self.config.freshness_slots) {
            candidates.push(Candidate {
                item: item.clone(),
                score: self.config.freshness_score,
                reason: ReasonKind::NewArrival,
                explanation: "newly added".to_string(),
            });
        }
    }

    /// One insert per surfaced row; a failed insert is logged and skipped
    /// without aborting the batch.
    async fn persist_batch(
        &self,
        user_id: Uuid,
        candidates: Vec<Candidate>,
        algorithm: AlgorithmKind,
        variant: &ExperimentVariant,
    ) -> Vec<Recommendation> {
        let now = Utc::now();
        let mut recs = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let rec = Recommendation {
                id: Uuid::new_v4(),
                user_id,
                item_id: candidate.item.id,
                score: candidate.score.clamp(0.0, 1.0),
                reason: candidate.reason,
                explanation: candidate.explanation,
                algorithm,
                variant_id: variant.id.clone(),
                created_at: now,
                clicked_at: None,
                purchased_at: None,
            };
            if let Err(e) = self.store.insert_recommendation(&rec).await {
                warn!(
                    user_id = %user_id,
                    item_id = %rec.item_id,
                    "failed to persist recommendation row, continuing: {}",
                    e
                );
            }
            recs.push(rec);
        }

        recs
    }

    async fn touched_items(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let events = retry_read_once("recent_interactions", || {
            self.store
                .recent_interactions(user_id, self.config.history_limit)
        })
        .await?;
        Ok(events.into_iter().map(|e| e.item_id).collect())
    }

    async fn catalog(&self) -> Result<Vec<CatalogItem>> {
        Ok(retry_read_once("all_items", || self.store.all_items()).await?)
    }

    async fn cache_results(&self, cache_key: &str, recs: &[Recommendation]) {
        if let Err(e) = self
            .cache
            .set_json(
                cache_key,
                &recs,
                Duration::from_secs(self.config.recommendations_ttl_secs),
            )
            .await
        {
            warn!("recommendation cache write failed: {}", e);
        }
    }
}

/// Profile-vs-item four-factor score plus the explanation fragments for the
/// factors that fired.
fn profile_item_score(profile: &UserProfile, item: &CatalogItem) -> (f64, Vec<String>) {
    let mut reasons = Vec::new();

    let grade = if profile.preferred_grades.contains(&item.grade) {
        reasons.push(format!(
            "matches your preference for {} grade",
            item.grade.as_str()
        ));
        1.0
    } else {
        0.0
    };

    let flavor = jaccard_str(&profile.preferred_flavors, &item.flavor_tags);
    if flavor > 0.0 {
        let shared: Vec<&str> = item
            .flavor_tags
            .iter()
            .filter(|f| profile.preferred_flavors.contains(f))
            .map(|f| f.as_str())
            .collect();
        reasons.push(format!("has {} flavors you enjoy", shared.join(", ")));
    }

    let price = if profile.contains_price(item.price) {
        // The cold profile's unbounded band matches everything, but a cold
        // profile never reaches content scoring.
        reasons.push("fits your price range".to_string());
        1.0
    } else {
        0.0
    };

    let origin = if profile.preferred_origins.contains(&item.origin) {
        reasons.push(format!("from {}, an origin you favor", item.origin));
        1.0
    } else {
        0.0
    };

    let weighted = GRADE_WEIGHT * grade
        + FLAVOR_WEIGHT * flavor
        + PRICE_WEIGHT * price
        + ORIGIN_WEIGHT * origin;
    (weighted / FACTOR_COUNT, reasons)
}
