use std::str::FromStr;

/// Search tuning knobs, read from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Normalized queries shorter than this return no results.
    pub min_query_len: usize,
    /// Fuzzy relevance below this excludes an entry from the result set.
    pub similarity_floor: f64,
    /// Baseline relevance for browse (empty-query) requests.
    pub browse_baseline: f64,
    pub max_limit: usize,
    pub results_ttl_secs: u64,
    pub facets_ttl_secs: u64,
    pub autocomplete_ttl_secs: u64,
    /// Historical queries pulled into autocomplete per fragment.
    pub popular_query_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: 2,
            similarity_floor: 0.2,
            browse_baseline: 0.5,
            max_limit: 100,
            results_ttl_secs: 60,
            facets_ttl_secs: 300,
            autocomplete_ttl_secs: 300,
            popular_query_limit: 10,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_query_len: env_parse("SEARCH_MIN_QUERY_LEN", defaults.min_query_len),
            similarity_floor: env_parse("SEARCH_SIMILARITY_FLOOR", defaults.similarity_floor),
            browse_baseline: env_parse("SEARCH_BROWSE_BASELINE", defaults.browse_baseline),
            max_limit: env_parse("SEARCH_MAX_LIMIT", defaults.max_limit),
            results_ttl_secs: env_parse("SEARCH_RESULTS_TTL_SECS", defaults.results_ttl_secs),
            facets_ttl_secs: env_parse("SEARCH_FACETS_TTL_SECS", defaults.facets_ttl_secs),
            autocomplete_ttl_secs: env_parse(
                "SEARCH_AUTOCOMPLETE_TTL_SECS",
                defaults.autocomplete_ttl_secs,
            ),
            popular_query_limit: env_parse(
                "SEARCH_POPULAR_QUERY_LIMIT",
                defaults.popular_query_limit,
            ),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
