use crate::config::RecommendationConfig;
use crate::error::Result;
use catalog_core::models::{CatalogItem, Grade, InteractionEvent, UserProfile};
use catalog_core::{retry_read_once, Cache, CacheExt, CatalogStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const PROFILE_KEY: &str = "user:profile:";

const TOP_GRADES: usize = 3;
const TOP_FLAVORS: usize = 5;
/// Price band padding applied to the p10/p90 percentiles.
const PRICE_PAD: f64 = 0.2;

/// Builds a user's weighted preference vector from their interaction history.
///
/// Each event contributes its action weight (view 1, click 2, add-to-cart 5,
/// purchase 10) to the grade, flavor and origin of the touched item. The top
/// 3 grades and top 5 flavors become "preferred"; the price band is the
/// 10th-90th percentile of interacted prices padded by 20% either way.
pub struct ProfileBuilder {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    config: RecommendationConfig,
}

impl ProfileBuilder {
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

    pub async fn build(&self, user_id: Uuid) -> Result<UserProfile> {
        let cache_key = format!("{}{}", PROFILE_KEY, user_id);
        match self.cache.get_json::<UserProfile>(&cache_key).await {
            Ok(Some(profile)) => return Ok(profile),
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, "profile cache read failed: {}", e),
        }

        let events = match retry_read_once("recent_interactions", || {
            self.store
                .recent_interactions(user_id, self.config.history_limit)
        })
        .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    "interaction history unavailable, serving cold profile: {}",
                    e
                );
                return Ok(UserProfile::cold(user_id));
            }
        };

        if events.is_empty() {
            return Ok(UserProfile::cold(user_id));
        }

        let item_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = events.iter().map(|e| e.item_id).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let items: HashMap<Uuid, CatalogItem> = self
            .store
            .items(&item_ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        let profile = aggregate(user_id, &events, &items);
        debug!(
            user_id = %user_id,
            events = events.len(),
            grades = ?profile.preferred_grades,
            "built user profile"
        );

        if let Err(e) = self
            .cache
            .set_json(
                &cache_key,
                &profile,
                Duration::from_secs(self.config.profile_ttl_secs),
            )
            .await
        {
            warn!(user_id = %user_id, "profile cache write failed: {}", e);
        }

        Ok(profile)
    }

    /// Drops the cached profile; called after a purchase.
    pub async fn invalidate(&self, user_id: Uuid) {
        let cache_key = format!("{}{}", PROFILE_KEY, user_id);
        if let Err(e) = self.cache.delete(&cache_key).await {
            warn!(user_id = %user_id, "profile cache invalidation failed: {}", e);
        }
    }
}

fn aggregate(
    user_id: Uuid,
    events: &[InteractionEvent],
    items: &HashMap<Uuid, CatalogItem>,
) -> UserProfile {
    let mut grade_weights: HashMap<Grade, f64> = HashMap::new();
    let mut flavor_weights: HashMap<String, f64> = HashMap::new();
    let mut origin_weights: HashMap<String, f64> = HashMap::new();
    let mut prices: Vec<f64> = Vec::new();

    for event in events {
        let Some(item) = items.get(&event.item_id) else {
            // Dangling reference; the item was removed after the interaction.
            continue;
        };
        let weight = event.kind.weight();

        *grade_weights.entry(item.grade).or_insert(0.0) += weight;
        for flavor in &item.flavor_tags {
            *flavor_weights.entry(flavor.clone()).or_insert(0.0) += weight;
        }
        *origin_weights.entry(item.origin.clone()).or_insert(0.0) += weight;
        prices.push(item.price);
    }

    if prices.is_empty() {
        return UserProfile::cold(user_id);
    }

    prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let price_min = percentile(&prices, 0.10) * (1.0 - PRICE_PAD);
    let price_max = percentile(&prices, 0.90) * (1.0 + PRICE_PAD);

    UserProfile {
        user_id,
        preferred_grades: ranked_keys(grade_weights, TOP_GRADES),
        preferred_flavors: ranked_keys(flavor_weights, TOP_FLAVORS),
        price_min,
        price_max,
        // Union of origins touched; ranked but never truncated.
        preferred_origins: ranked_keys(origin_weights, usize::MAX),
        interaction_count: events.len(),
    }
}

/// Keys ranked by descending weight, truncated to `limit`.
fn ranked_keys<K: Ord>(weights: HashMap<K, f64>, limit: usize) -> Vec<K> {
    let mut ranked: Vec<(K, f64)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.into_iter().take(limit).map(|(k, _)| k).collect()
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
