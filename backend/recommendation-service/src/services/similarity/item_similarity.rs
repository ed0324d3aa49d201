use super::jaccard_str;
use crate::config::RecommendationConfig;
use crate::error::Result;
use catalog_core::models::CatalogItem;
use catalog_core::{retry_read_once, Cache, CacheExt, CatalogStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const ITEM_SIMILAR_KEY: &str = "item:similar:";

/// Factor weights. The weighted sum is divided by the fixed factor count, so
/// the score tops out at 0.25 even on a full match on every factor; all
/// downstream thresholds are calibrated against that scale.
const GRADE_WEIGHT: f64 = 0.3;
const FLAVOR_WEIGHT: f64 = 0.4;
const PRICE_WEIGHT: f64 = 0.2;
const ORIGIN_WEIGHT: f64 = 0.1;
const FACTOR_COUNT: f64 = 4.0;

/// Price falloff width as a fraction of the larger price.
const PRICE_TOLERANCE: f64 = 0.2;

/// Content similarity between two catalog items: grade match, flavor-tag
/// overlap, price proximity and origin match. Symmetric by construction.
pub fn item_similarity(a: &CatalogItem, b: &CatalogItem) -> f64 {
    let grade = if a.grade == b.grade { 1.0 } else { 0.0 };
    let flavor = jaccard_str(&a.flavor_tags, &b.flavor_tags);
    let price = price_proximity(a.price, b.price);
    let origin = if a.origin == b.origin { 1.0 } else { 0.0 };

    let weighted = GRADE_WEIGHT * grade
        + FLAVOR_WEIGHT * flavor
        + PRICE_WEIGHT * price
        + ORIGIN_WEIGHT * origin;
    weighted / FACTOR_COUNT
}

/// Linear falloff from full credit at equal prices to zero at a 20%
/// difference of the larger price.
fn price_proximity(a: f64, b: f64) -> f64 {
    let larger = a.max(b);
    if larger <= 0.0 {
        return 1.0;
    }
    let ratio = (a - b).abs() / larger;
    (1.0 - ratio / PRICE_TOLERANCE).max(0.0)
}

/// Serves the standalone "similar products" query over cached item-item
/// similarity edges.
pub struct ItemSimilarityEngine {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    config: RecommendationConfig,
}

impl ItemSimilarityEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<dyn Cache>,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Top similar items for a seed item. An unknown seed degrades to an
    /// empty result rather than erroring.
    pub async fn similar_items(&self, item_id: Uuid, limit: usize) -> Result<Vec<CatalogItem>> {
        let edges = self.similarity_edges(item_id).await?;
        let ids: Vec<Uuid> = edges.into_iter().take(limit).map(|(id, _)| id).collect();
        // Fetching by id filters out edges that dangle after catalog churn.
        Ok(self.store.items(&ids).await?)
    }

    async fn similarity_edges(&self, item_id: Uuid) -> Result<Vec<(Uuid, f64)>> {
        let cache_key = format!("{}{}", ITEM_SIMILAR_KEY, item_id);
        match self.cache.get_json::<Vec<(Uuid, f64)>>(&cache_key).await {
            Ok(Some(edges)) => return Ok(edges),
            Ok(None) => {}
            Err(e) => warn!(item_id = %item_id, "similarity cache read failed: {}", e),
        }

        let Some(seed) = self.store.item(item_id).await? else {
            info!(item_id = %item_id, "similar-items query for unknown item");
            return Ok(Vec::new());
        };

        let catalog = retry_read_once("all_items", || self.store.all_items()).await?;

        let mut edges: Vec<(Uuid, f64)> = catalog
            .iter()
            .filter(|other| other.id != seed.id)
            .map(|other| (other.id, item_similarity(&seed, other)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        edges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        edges.truncate(self.config.similar_item_pool);

        if let Err(e) = self
            .cache
            .set_json(
                &cache_key,
                &edges,
                Duration::from_secs(self.config.similarity_ttl_secs),
            )
            .await
        {
            warn!(item_id = %item_id, "similarity cache write failed: {}", e);
        }

        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::models::Grade;
    use catalog_core::{InMemoryStore, MemoryCache};
    use chrono::Utc;

    fn item(grade: Grade, flavors: &[&str], price: f64, origin: &str) -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            description: String::new(),
            provider: "Steepery".to_string(),
            origin: origin.to_string(),
            grade,
            flavor_tags: flavors.iter().map(|f| f.to_string()).collect(),
            price,
            size: "30g".to_string(),
            in_stock: true,
            view_count: 0,
            purchase_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = item(Grade::Ceremonial, &["umami", "sweet"], 38.0, "Uji");
        let b = item(Grade::Premium, &["umami", "grassy"], 45.0, "Yame");
        assert_eq!(item_similarity(&a, &b), item_similarity(&b, &a));
    }

    #[test]
    fn full_match_on_every_factor_scores_quarter() {
        let a = item(Grade::Ceremonial, &["umami"], 38.0, "Uji");
        let b = item(Grade::Ceremonial, &["umami"], 38.0, "Uji");
        assert!((item_similarity(&a, &b) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn price_proximity_falls_off_linearly() {
        assert!((price_proximity(100.0, 100.0) - 1.0).abs() < 1e-9);
        assert!((price_proximity(100.0, 90.0) - 0.5).abs() < 1e-9);
        assert_eq!(price_proximity(100.0, 80.0), 0.0);
        assert_eq!(price_proximity(100.0, 50.0), 0.0);
    }

    #[test]
    fn disjoint_items_score_zero() {
        let a = item(Grade::Ceremonial, &["umami"], 38.0, "Uji");
        let b = item(Grade::Kitchen, &["bitter"], 9.0, "Shizuoka");
        assert_eq!(item_similarity(&a, &b), 0.0);
    }

    #[tokio::test]
    async fn similar_items_ranked_and_bounded() {
        let store = Arc::new(InMemoryStore::new());
        let seed = item(Grade::Ceremonial, &["umami", "sweet"], 38.0, "Uji");
        let close = item(Grade::Ceremonial, &["umami"], 40.0, "Uji");
        let far = item(Grade::Culinary, &["bitter"], 38.5, "Uji");
        let seed_id = seed.id;
        let close_id = close.id;
        store.add_item(seed);
        store.add_item(close);
        store.add_item(far);

        let engine = ItemSimilarityEngine::new(
            store,
            Arc::new(MemoryCache::new()),
            RecommendationConfig::default(),
        );

        let similar = engine.similar_items(seed_id, 5).await.unwrap();
        assert!(!similar.is_empty());
        assert_eq!(similar[0].id, close_id);
    }

    #[tokio::test]
    async fn unknown_seed_returns_empty() {
        let engine = ItemSimilarityEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MemoryCache::new()),
            RecommendationConfig::default(),
        );
        let similar = engine.similar_items(Uuid::new_v4(), 5).await.unwrap();
        assert!(similar.is_empty());
    }
}
