use catalog_core::models::{CatalogItem, ReasonKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A similar user together with the evidence behind the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarUser {
    pub user_id: Uuid,
    /// Jaccard similarity of the two users' item sets, in [0, 1].
    pub similarity: f64,
    pub shared_items: usize,
}

/// A scored item travelling through the generation pipeline.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub item: CatalogItem,
    pub score: f64,
    pub reason: ReasonKind,
    pub explanation: String,
}
