use catalog_core::models::{CatalogItem, Grade};
use serde::{Deserialize, Serialize};

/// Filter predicates applied after fuzzy matching, before ranking.
/// Empty collections and `None` fields mean "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub providers: Vec<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub grades: Vec<Grade>,
    pub in_stock: Option<bool>,
    /// Origin substring match, any of.
    pub origins: Vec<String>,
    /// Flavor-tag intersection, any of.
    pub flavors: Vec<String>,
}

impl SearchFilters {
    pub fn has_price_range(&self) -> bool {
        self.price_min.is_some() || self.price_max.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAnalytics {
    pub query: String,
    pub normalized_query: String,
    pub result_count: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<CatalogItem>,
    /// Total matches before pagination.
    pub total: usize,
    pub analytics: SearchAnalytics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: usize,
}

/// Facet counts over the filtered (pre-ranking) result set, each group
/// sorted by count descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facets {
    pub providers: Vec<FacetCount>,
    pub grades: Vec<FacetCount>,
    pub origins: Vec<FacetCount>,
    pub flavors: Vec<FacetCount>,
    pub price_bands: Vec<FacetCount>,
    pub stock: Vec<FacetCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ItemName,
    Provider,
    Origin,
    Flavor,
    Grade,
    History,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub kind: SuggestionKind,
    pub score: f64,
}
