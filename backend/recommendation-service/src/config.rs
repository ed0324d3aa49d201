use std::env;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunables for the recommendation pipeline. Every field has an environment
/// override and a sensible default.
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Interaction events considered when building a profile or item set.
    pub history_limit: usize,
    /// Similar users kept per target user.
    pub similar_user_limit: usize,
    /// Candidate similar items kept in cache per seed item.
    pub similar_item_pool: usize,
    /// Minimum content-based candidate score.
    pub content_score_floor: f64,
    pub trending_window_days: i64,
    pub freshness_window_days: i64,
    pub freshness_score: f64,
    pub freshness_slots: usize,
    /// Diversity caps: occurrences per grade / per origin.
    pub grade_cap: usize,
    pub origin_cap: usize,
    /// Diversity never drops below this many highest-scoring candidates.
    pub diversity_floor: usize,
    pub max_limit: usize,
    pub profile_ttl_secs: u64,
    pub similarity_ttl_secs: u64,
    pub recommendations_ttl_secs: u64,
    pub experiment_name: String,
    pub experiment_salt: String,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            similar_user_limit: 10,
            similar_item_pool: 50,
            content_score_floor: 0.1,
            trending_window_days: 7,
            freshness_window_days: 30,
            freshness_score: 0.6,
            freshness_slots: 5,
            grade_cap: 3,
            origin_cap: 2,
            diversity_floor: 10,
            max_limit: 100,
            profile_ttl_secs: 300,
            similarity_ttl_secs: 1800,
            recommendations_ttl_secs: 120,
            experiment_name: "ranking_strategy".to_string(),
            experiment_salt: "steepery-ranking-salt".to_string(),
        }
    }
}

impl RecommendationConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            history_limit: env_parse("REC_HISTORY_LIMIT", defaults.history_limit),
            similar_user_limit: env_parse("REC_SIMILAR_USER_LIMIT", defaults.similar_user_limit),
            similar_item_pool: env_parse("REC_SIMILAR_ITEM_POOL", defaults.similar_item_pool),
            content_score_floor: env_parse("REC_CONTENT_SCORE_FLOOR", defaults.content_score_floor),
            trending_window_days: env_parse("REC_TRENDING_WINDOW_DAYS", defaults.trending_window_days),
            freshness_window_days: env_parse(
                "REC_FRESHNESS_WINDOW_DAYS",
                defaults.freshness_window_days,
            ),
            freshness_score: env_parse("REC_FRESHNESS_SCORE", defaults.freshness_score),
            freshness_slots: env_parse("REC_FRESHNESS_SLOTS", defaults.freshness_slots),
            grade_cap: env_parse("REC_GRADE_CAP", defaults.grade_cap),
            origin_cap: env_parse("REC_ORIGIN_CAP", defaults.origin_cap),
            diversity_floor: env_parse("REC_DIVERSITY_FLOOR", defaults.diversity_floor),
            max_limit: env_parse("REC_MAX_LIMIT", defaults.max_limit),
            profile_ttl_secs: env_parse("REC_PROFILE_TTL_SECS", defaults.profile_ttl_secs),
            similarity_ttl_secs: env_parse("REC_SIMILARITY_TTL_SECS", defaults.similarity_ttl_secs),
            recommendations_ttl_secs: env_parse(
                "REC_RESULTS_TTL_SECS",
                defaults.recommendations_ttl_secs,
            ),
            experiment_name: env::var("REC_EXPERIMENT_NAME")
                .unwrap_or(defaults.experiment_name),
            experiment_salt: env::var("REC_EXPERIMENT_SALT")
                .unwrap_or(defaults.experiment_salt),
        }
    }
}
