use crate::config::RecommendationConfig;
use crate::error::Result;
use catalog_core::models::CatalogItem;
use catalog_core::{retry_read_once, CatalogStore};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Trending fallback: items ranked by interaction count over a recent window,
/// with scores decaying 0.1 per rank position starting at 0.9.
pub struct TrendingEngine {
    store: Arc<dyn CatalogStore>,
    config: RecommendationConfig,
}

impl TrendingEngine {
    pub fn new(store: Arc<dyn CatalogStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }

    pub async fn trending(&self, limit: usize) -> Result<Vec<(CatalogItem, f64)>> {
        let since = Utc::now() - ChronoDuration::days(self.config.trending_window_days);
        let events = match retry_read_once("interactions_since", || {
            self.store.interactions_since(since)
        })
        .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!("trending window unavailable: {}", e);
                return Ok(Vec::new());
            }
        };

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for event in &events {
            *counts.entry(event.item_id).or_insert(0) += 1;
        }

        let mut ranked: Vec<(Uuid, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
        // Fetching by id drops references that dangle after catalog churn.
        let items = self.store.items(&ids).await?;
        let by_id: HashMap<Uuid, CatalogItem> = items.into_iter().map(|i| (i.id, i)).collect();

        let trending: Vec<(CatalogItem, f64)> = ranked
            .into_iter()
            .filter_map(|(id, _)| by_id.get(&id).cloned())
            .take(limit)
            .enumerate()
            .map(|(rank, item)| (item, (0.9 - 0.1 * rank as f64).max(0.0)))
            .collect();

        Ok(trending)
    }
}
