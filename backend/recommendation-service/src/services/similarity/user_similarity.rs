use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::SimilarUser;
use catalog_core::{retry_read_once, Cache, CacheExt, CatalogStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) const USER_SIMILAR_KEY: &str = "user:similar:";

/// User-user collaborative similarity.
///
/// Algorithm:
/// 1. Build the target user's item set from recent interactions.
/// 2. Pool candidates through the item->users inverted index: only users
///    sharing at least `min(2, |target's items|)` items qualify.
/// 3. Score each candidate with Jaccard similarity over the two item sets.
/// 4. Keep the top K, cached with a medium TTL.
pub struct UserSimilarityEngine {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    config: RecommendationConfig,
}

impl UserSimilarityEngine {
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

    pub async fn similar_users(&self, user_id: Uuid) -> Result<Vec<SimilarUser>> {
        let cache_key = format!("{}{}", USER_SIMILAR_KEY, user_id);
        match self.cache.get_json::<Vec<SimilarUser>>(&cache_key).await {
            Ok(Some(similar)) => return Ok(similar),
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, "similarity cache read failed: {}", e),
        }

        let target_items = self.item_set(user_id).await?;
        if target_items.is_empty() {
            return Ok(Vec::new());
        }

        let min_shared = 2.min(target_items.len());

        // Inverted index walk: item -> users who touched it.
        let mut shared: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for item_id in &target_items {
            let events = match self.store.item_interactions(*item_id).await {
                Ok(events) => events,
                Err(e) => {
                    warn!(item_id = %item_id, "inverted index read failed: {}", e);
                    continue;
                }
            };
            for event in events {
                if event.user_id != user_id {
                    shared.entry(event.user_id).or_default().insert(*item_id);
                }
            }
        }

        let mut similar: Vec<SimilarUser> = Vec::new();
        for (candidate, shared_items) in shared {
            if shared_items.len() < min_shared {
                continue;
            }
            let candidate_items = self.item_set(candidate).await?;
            let intersection = target_items.intersection(&candidate_items).count();
            let union = target_items.union(&candidate_items).count();
            if union == 0 {
                continue;
            }
            similar.push(SimilarUser {
                user_id: candidate,
                similarity: intersection as f64 / union as f64,
                shared_items: shared_items.len(),
            });
        }

        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        similar.truncate(self.config.similar_user_limit);

        debug!(
            user_id = %user_id,
            neighbors = similar.len(),
            "computed user similarity"
        );

        if let Err(e) = self
            .cache
            .set_json(
                &cache_key,
                &similar,
                Duration::from_secs(self.config.similarity_ttl_secs),
            )
            .await
        {
            warn!(user_id = %user_id, "similarity cache write failed: {}", e);
        }

        Ok(similar)
    }

    async fn item_set(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let events = retry_read_once("recent_interactions", || {
            self.store
                .recent_interactions(user_id, self.config.history_limit)
        })
        .await?;
        Ok(events.into_iter().map(|e| e.item_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::models::{InteractionEvent, InteractionKind};
    use catalog_core::{InMemoryStore, MemoryCache};
    use chrono::Utc;

    fn touch(store: &InMemoryStore, user: Uuid, item: Uuid) {
        store.add_interaction(InteractionEvent {
            user_id: user,
            item_id: item,
            kind: InteractionKind::View,
            created_at: Utc::now(),
        });
    }

    fn engine(store: Arc<InMemoryStore>) -> UserSimilarityEngine {
        UserSimilarityEngine::new(
            store,
            Arc::new(MemoryCache::new()),
            RecommendationConfig::default(),
        )
    }

    #[tokio::test]
    async fn no_history_means_no_neighbors() {
        let store = Arc::new(InMemoryStore::new());
        let similar = engine(store).similar_users(Uuid::new_v4()).await.unwrap();
        assert!(similar.is_empty());
    }

    #[tokio::test]
    async fn jaccard_over_shared_items() {
        let store = Arc::new(InMemoryStore::new());
        let target = Uuid::new_v4();
        let twin = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let items: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for item in &items {
            touch(&store, target, *item);
            touch(&store, twin, *item);
        }
        // One shared item is below the min(2, |items|) pool threshold.
        touch(&store, stranger, items[0]);
        touch(&store, stranger, Uuid::new_v4());

        let similar = engine(store).similar_users(target).await.unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].user_id, twin);
        assert!((similar[0].similarity - 1.0).abs() < 1e-9);
        assert_eq!(similar[0].shared_items, 4);
    }

    #[tokio::test]
    async fn single_item_user_pools_on_one_shared_item() {
        let store = Arc::new(InMemoryStore::new());
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();
        let item = Uuid::new_v4();

        touch(&store, target, item);
        touch(&store, other, item);
        touch(&store, other, Uuid::new_v4());

        let similar = engine(store).similar_users(target).await.unwrap();
        assert_eq!(similar.len(), 1);
        assert!((similar[0].similarity - 0.5).abs() < 1e-9);
    }
}
