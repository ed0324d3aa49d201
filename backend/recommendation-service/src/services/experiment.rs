use crate::config::RecommendationConfig;
use crate::error::Result;
use catalog_core::models::{Experiment, ExperimentAssignment, ExperimentVariant, RankingStrategy};
use catalog_core::CatalogStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Deterministic experiment assignment.
///
/// Algorithm:
/// 1. Prefer an existing assignment row unconditionally (stability over
///    freshness; re-assignment would corrupt A/B measurement).
/// 2. Otherwise hash `user_id + salt` to a 0-99 bucket and walk the ordered
///    variant list accumulating weights (which sum to 100).
/// 3. Persist the new assignment before returning; if that write fails the
///    computed variant is still used for this call, logged as degraded.
pub struct ExperimentService {
    store: Arc<dyn CatalogStore>,
    config: RecommendationConfig,
}

impl ExperimentService {
    pub fn new(store: Arc<dyn CatalogStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }

    pub async fn assign_variant(&self, user_id: Uuid) -> Result<ExperimentVariant> {
        let experiment = self.active_or_default().await?;

        if let Some(existing) = self
            .store
            .assignment(user_id, &experiment.name)
            .await?
        {
            if let Some(variant) = experiment
                .variants
                .iter()
                .find(|v| v.id == existing.variant_id)
            {
                return Ok(variant.clone());
            }
            warn!(
                user_id = %user_id,
                variant_id = %existing.variant_id,
                "assigned variant no longer in experiment, re-bucketing"
            );
        }

        let bucket = self.bucket_for(user_id);
        let variant = match select_variant(&experiment.variants, bucket) {
            Some(variant) => variant.clone(),
            None => {
                warn!(
                    experiment = %experiment.name,
                    "active experiment has no variants, serving fallback"
                );
                return Ok(fallback_variant());
            }
        };

        let assignment = ExperimentAssignment {
            user_id,
            experiment_name: experiment.name.clone(),
            variant_id: variant.id.clone(),
            assigned_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_assignment(&assignment).await {
            // Degraded: the unpersisted variant still serves this one call.
            warn!(
                user_id = %user_id,
                variant_id = %variant.id,
                "failed to persist experiment assignment, using unpersisted variant: {}",
                e
            );
        }

        Ok(variant)
    }

    /// Hash of `user_id + salt` reduced to a 0-99 percentile bucket.
    fn bucket_for(&self, user_id: Uuid) -> u32 {
        let digest = md5::compute(format!("{}{}", user_id, self.config.experiment_salt));
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.0[..8]);
        (u64::from_be_bytes(head) % 100) as u32
    }

    async fn active_or_default(&self) -> Result<Experiment> {
        if let Some(experiment) = self
            .store
            .active_experiment(&self.config.experiment_name)
            .await?
        {
            return Ok(experiment);
        }

        let experiment = default_experiment(&self.config.experiment_name);
        match self.store.insert_experiment(&experiment).await {
            Ok(()) => info!(
                experiment = %experiment.name,
                "created default ranking experiment"
            ),
            Err(e) => warn!(
                experiment = %experiment.name,
                "failed to persist default experiment, using in-memory copy: {}",
                e
            ),
        }
        Ok(experiment)
    }
}

/// First variant whose cumulative weight reaches the hashed percentile.
/// `None` only for an experiment row with no variants at all.
fn select_variant(variants: &[ExperimentVariant], bucket: u32) -> Option<&ExperimentVariant> {
    let mut cumulative = 0;
    for variant in variants {
        cumulative += variant.weight;
        if cumulative >= bucket {
            return Some(variant);
        }
    }
    // Weights sum to 100 and buckets are 0-99, so falling through means the
    // stored weights are malformed; the last variant still beats erroring.
    variants.last()
}

/// Served when assignment cannot produce a proper variant (store outage or a
/// malformed experiment row).
pub(crate) fn fallback_variant() -> ExperimentVariant {
    ExperimentVariant {
        id: "hybrid_50".to_string(),
        strategy: RankingStrategy::Hybrid {
            collaborative_weight: 0.5,
        },
        weight: 20,
    }
}

/// Default five-variant experiment: collaborative-only, content-only and
/// three hybrid blends, with equal traffic shares.
fn default_experiment(name: &str) -> Experiment {
    let variants = vec![
        ExperimentVariant {
            id: "collaborative".to_string(),
            strategy: RankingStrategy::Collaborative,
            weight: 20,
        },
        ExperimentVariant {
            id: "content".to_string(),
            strategy: RankingStrategy::ContentBased,
            weight: 20,
        },
        ExperimentVariant {
            id: "hybrid_30".to_string(),
            strategy: RankingStrategy::Hybrid {
                collaborative_weight: 0.3,
            },
            weight: 20,
        },
        ExperimentVariant {
            id: "hybrid_50".to_string(),
            strategy: RankingStrategy::Hybrid {
                collaborative_weight: 0.5,
            },
            weight: 20,
        },
        ExperimentVariant {
            id: "hybrid_70".to_string(),
            strategy: RankingStrategy::Hybrid {
                collaborative_weight: 0.7,
            },
            weight: 20,
        },
    ];

    Experiment {
        name: name.to_string(),
        variants,
        active: true,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::InMemoryStore;

    fn service(store: Arc<InMemoryStore>) -> ExperimentService {
        ExperimentService::new(store, RecommendationConfig::default())
    }

    #[test]
    fn default_experiment_weights_sum_to_100() {
        let experiment = default_experiment("ranking_strategy");
        let total: u32 = experiment.variants.iter().map(|v| v.weight).sum();
        assert_eq!(total, 100);
        assert_eq!(experiment.variants.len(), 5);
    }

    #[test]
    fn variant_selection_walks_cumulative_weights() {
        let experiment = default_experiment("ranking_strategy");
        let pick = |bucket| select_variant(&experiment.variants, bucket).unwrap().id.clone();
        assert_eq!(pick(0), "collaborative");
        assert_eq!(pick(21), "content");
        assert_eq!(pick(99), "hybrid_70");
    }

    #[tokio::test]
    async fn experiment_without_variants_serves_fallback() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_experiment(&Experiment {
                name: "ranking_strategy".to_string(),
                variants: Vec::new(),
                active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let variant = service(store).assign_variant(Uuid::new_v4()).await.unwrap();
        assert_eq!(variant.id, "hybrid_50");
        assert!(matches!(
            variant.strategy,
            RankingStrategy::Hybrid { .. }
        ));
    }

    #[tokio::test]
    async fn assignment_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);
        let user = Uuid::new_v4();

        let first = svc.assign_variant(user).await.unwrap();
        let second = svc.assign_variant(user).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn bucketing_is_deterministic_across_instances() {
        let user = Uuid::new_v4();

        let a = service(Arc::new(InMemoryStore::new()))
            .assign_variant(user)
            .await
            .unwrap();
        let b = service(Arc::new(InMemoryStore::new()))
            .assign_variant(user)
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_assignment() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store.clone());
        let user = Uuid::new_v4();

        // First call creates the default experiment while writable.
        svc.assign_variant(user).await.unwrap();

        store.set_fail_writes(true);
        let variant = svc.assign_variant(Uuid::new_v4()).await.unwrap();
        assert!(!variant.id.is_empty());
    }
}
