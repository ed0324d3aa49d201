use crate::config::RecommendationConfig;
use crate::models::SimilarUser;
use crate::services::generator::RECS_KEY;
use crate::services::profile::ProfileBuilder;
use crate::services::similarity::user_similarity::USER_SIMILAR_KEY;
use catalog_core::{Cache, CacheExt, CatalogStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Feedback tracking. Both entry points are fire-and-forget: a tracking
/// failure is logged and swallowed so it never surfaces to the caller.
pub struct Tracker {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    profiles: ProfileBuilder,
}

impl Tracker {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<dyn Cache>,
        config: RecommendationConfig,
    ) -> Self {
        let profiles = ProfileBuilder::new(store.clone(), cache.clone(), config);
        Self {
            store,
            cache,
            profiles,
        }
    }

    pub async fn track_click(&self, recommendation_id: Uuid) {
        if let Err(e) = self
            .store
            .mark_recommendation_clicked(recommendation_id, Utc::now())
            .await
        {
            warn!(recommendation_id = %recommendation_id, "click tracking failed: {}", e);
        }
    }

    /// Marks the row purchased and invalidates the purchaser's cached state:
    /// their profile, their recommendation pages, their neighbor list, and
    /// the recommendation pages of any cached neighbors (whose collaborative
    /// signal just changed).
    pub async fn track_purchase(&self, recommendation_id: Uuid) {
        if let Err(e) = self
            .store
            .mark_recommendation_purchased(recommendation_id, Utc::now())
            .await
        {
            warn!(recommendation_id = %recommendation_id, "purchase tracking failed: {}", e);
            return;
        }

        let user_id = match self.store.recommendation(recommendation_id).await {
            Ok(Some(rec)) => rec.user_id,
            Ok(None) => {
                warn!(recommendation_id = %recommendation_id, "purchased row not found");
                return;
            }
            Err(e) => {
                warn!(
                    recommendation_id = %recommendation_id,
                    "purchase lookup failed, skipping invalidation: {}",
                    e
                );
                return;
            }
        };

        self.invalidate_user(user_id).await;
    }

    async fn invalidate_user(&self, user_id: Uuid) {
        self.profiles.invalidate(user_id).await;

        let similar_key = format!("{}{}", USER_SIMILAR_KEY, user_id);
        let neighbors = self
            .cache
            .get_json::<Vec<SimilarUser>>(&similar_key)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %user_id, "neighbor lookup for invalidation failed: {}", e);
                None
            })
            .unwrap_or_default();

        for key in [similar_key, format!("{}{}:", RECS_KEY, user_id)] {
            if let Err(e) = self.cache.delete_prefix(&key).await {
                warn!(user_id = %user_id, key = %key, "cache invalidation failed: {}", e);
            }
        }

        for neighbor in &neighbors {
            let key = format!("{}{}:", RECS_KEY, neighbor.user_id);
            if let Err(e) = self.cache.delete_prefix(&key).await {
                warn!(neighbor = %neighbor.user_id, "neighbor invalidation failed: {}", e);
            }
        }

        debug!(
            user_id = %user_id,
            neighbors = neighbors.len(),
            "invalidated caches after purchase"
        );
    }
}
