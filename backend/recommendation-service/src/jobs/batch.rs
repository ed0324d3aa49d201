//! Background job that precomputes recommendations for recently active
//! users so their next request hits a warm cache. Designed to run as a
//! cron-style process, either one pass or on an interval.

use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::services::generator::{RecommendationService, RECS_KEY};
use catalog_core::{Cache, CacheExt, CatalogStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Users processed per chunk.
    pub chunk_size: usize,
    /// Upper bound on users per pass (0 = unlimited).
    pub max_users: usize,
    /// Pause between chunks, keeps the store from being hammered.
    pub chunk_delay_ms: u64,
    /// Recommendations generated per user.
    pub recommendation_limit: usize,
    /// Exit after one pass instead of looping.
    pub run_once: bool,
    /// Interval between passes when looping.
    pub interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_users: 0,
            chunk_delay_ms: 500,
            recommendation_limit: 10,
            run_once: true,
            interval_secs: 3600 * 4,
        }
    }
}

impl BatchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: env_parse("BATCH_CHUNK_SIZE", defaults.chunk_size),
            max_users: env_parse("BATCH_MAX_USERS", defaults.max_users),
            chunk_delay_ms: env_parse("BATCH_CHUNK_DELAY_MS", defaults.chunk_delay_ms),
            recommendation_limit: env_parse(
                "BATCH_RECOMMENDATION_LIMIT",
                defaults.recommendation_limit,
            ),
            run_once: env_parse("BATCH_RUN_ONCE", defaults.run_once),
            interval_secs: env_parse("BATCH_INTERVAL_SECS", defaults.interval_secs),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Default)]
pub struct BatchJobStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub users_processed: usize,
    pub users_failed: usize,
    pub total_duration_ms: u64,
}

pub struct RecommendationBatchJob {
    config: BatchConfig,
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn Cache>,
    service: RecommendationService,
}

impl RecommendationBatchJob {
    pub fn new(
        config: BatchConfig,
        store: Arc<dyn CatalogStore>,
        cache: Arc<dyn Cache>,
        service_config: RecommendationConfig,
    ) -> Self {
        let service = RecommendationService::new(store.clone(), cache.clone(), service_config);
        Self {
            config,
            store,
            cache,
            service,
        }
    }

    pub async fn run(&self) -> Result<BatchJobStats> {
        loop {
            let stats = self.run_single_pass().await?;

            info!(
                processed = stats.users_processed,
                failed = stats.users_failed,
                duration_ms = stats.total_duration_ms,
                "recommendation batch pass completed"
            );

            if self.config.run_once {
                return Ok(stats);
            }

            info!(
                interval_secs = self.config.interval_secs,
                "sleeping until next pass"
            );
            sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }

    async fn run_single_pass(&self) -> Result<BatchJobStats> {
        let start = Instant::now();
        let mut stats = BatchJobStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let user_limit = if self.config.max_users > 0 {
            self.config.max_users
        } else {
            10_000
        };
        let users = self.store.active_user_ids(user_limit).await?;

        info!(
            user_count = users.len(),
            chunk_size = self.config.chunk_size,
            "starting recommendation batch pass"
        );

        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = users.len().div_ceil(chunk_size);
        for (chunk_idx, chunk) in users.chunks(chunk_size).enumerate() {
            info!(chunk = chunk_idx + 1, users = chunk.len(), "processing chunk");

            for user_id in chunk {
                stats.users_processed += 1;
                self.regenerate(*user_id, &mut stats).await;
            }

            if self.config.chunk_delay_ms > 0 && chunk_idx + 1 < chunk_count {
                sleep(Duration::from_millis(self.config.chunk_delay_ms)).await;
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Drops the user's cached pages first so the pipeline recomputes from
    /// fresh state instead of serving the cache back to itself.
    async fn regenerate(&self, user_id: Uuid, stats: &mut BatchJobStats) {
        let prefix = format!("{}{}:", RECS_KEY, user_id);
        if let Err(e) = self.cache.delete_prefix(&prefix).await {
            warn!(user_id = %user_id, "stale recommendation eviction failed: {}", e);
        }

        if let Err(e) = self
            .service
            .generate_recommendations(user_id, self.config.recommendation_limit)
            .await
        {
            stats.users_failed += 1;
            error!(user_id = %user_id, "batch generation failed: {}", e);
        }
    }
}
