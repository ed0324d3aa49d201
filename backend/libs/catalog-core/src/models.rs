use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Matcha grade tiers, ordered from lowest to highest quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Kitchen,
    Culinary,
    Premium,
    Ceremonial,
}

impl Grade {
    pub const ALL: [Grade; 4] = [
        Grade::Kitchen,
        Grade::Culinary,
        Grade::Premium,
        Grade::Ceremonial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Kitchen => "kitchen",
            Grade::Culinary => "culinary",
            Grade::Premium => "premium",
            Grade::Ceremonial => "ceremonial",
        }
    }
}

/// A catalog product. Only stock, price and the popularity counters are ever
/// mutated, and only by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub origin: String,
    pub grade: Grade,
    pub flavor_tags: Vec<String>,
    pub price: f64,
    pub size: String,
    pub in_stock: bool,
    pub view_count: i64,
    pub purchase_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Click,
    AddToCart,
    Purchase,
}

impl InteractionKind {
    /// Signal strength used when aggregating interaction history.
    pub fn weight(&self) -> f64 {
        match self {
            InteractionKind::View => 1.0,
            InteractionKind::Click => 2.0,
            InteractionKind::AddToCart => 5.0,
            InteractionKind::Purchase => 10.0,
        }
    }
}

/// Append-only interaction event. Never mutated or deleted outside the
/// retention sweep owned by the store collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
}

/// Derived preference vector, rebuilt on demand and cached with a short TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    /// Ranked by weighted frequency, at most 3.
    pub preferred_grades: Vec<Grade>,
    /// Ranked by weighted frequency, at most 5.
    pub preferred_flavors: Vec<String>,
    pub price_min: f64,
    pub price_max: f64,
    /// Union of origins touched, ranked by weighted frequency, untruncated.
    pub preferred_origins: Vec<String>,
    pub interaction_count: usize,
}

impl UserProfile {
    /// Sentinel profile for a user with no interaction history.
    pub fn cold(user_id: Uuid) -> Self {
        Self {
            user_id,
            preferred_grades: Vec::new(),
            preferred_flavors: Vec::new(),
            price_min: 0.0,
            price_max: f64::MAX,
            preferred_origins: Vec::new(),
            interaction_count: 0,
        }
    }

    pub fn is_cold(&self) -> bool {
        self.interaction_count == 0
    }

    pub fn contains_price(&self, price: f64) -> bool {
        price >= self.price_min && price <= self.price_max
    }
}

/// Ranking strategy selected by a user's experiment variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    Collaborative,
    ContentBased,
    Hybrid { collaborative_weight: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentVariant {
    pub id: String,
    pub strategy: RankingStrategy,
    /// Traffic share; variant weights within an experiment sum to 100.
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    pub variants: Vec<ExperimentVariant>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Immutable once written. Re-assignment would corrupt A/B measurement, so
/// lookups always prefer an existing row over a fresh hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentAssignment {
    pub user_id: Uuid,
    pub experiment_name: String,
    pub variant_id: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReasonKind {
    SimilarUsers,
    ProfileMatch,
    Hybrid,
    Trending,
    NewArrival,
}

impl ReasonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonKind::SimilarUsers => "similar_users",
            ReasonKind::ProfileMatch => "profile_match",
            ReasonKind::Hybrid => "hybrid",
            ReasonKind::Trending => "trending",
            ReasonKind::NewArrival => "new_arrival",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Collaborative,
    ContentBased,
    Hybrid,
    Trending,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::Collaborative => "collaborative",
            AlgorithmKind::ContentBased => "content_based",
            AlgorithmKind::Hybrid => "hybrid",
            AlgorithmKind::Trending => "trending",
        }
    }
}

/// A surfaced recommendation, persisted for analytics. `clicked_at` and
/// `purchased_at` are the only fields ever mutated, each at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub score: f64,
    pub reason: ReasonKind,
    pub explanation: String,
    pub algorithm: AlgorithmKind,
    pub variant_id: String,
    pub created_at: DateTime<Utc>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub purchased_at: Option<DateTime<Utc>>,
}

/// Aggregated historical search query, used for autocomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQueryStat {
    pub query: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub details: BTreeMap<String, String>,
}

impl HealthStatus {
    pub fn healthy(&self) -> bool {
        self.status == "ok"
    }
}
