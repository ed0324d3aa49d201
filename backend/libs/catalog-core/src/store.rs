use crate::error::StoreError;
use crate::models::{
    CatalogItem, Experiment, ExperimentAssignment, InteractionEvent, Recommendation,
    SearchQueryStat,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Port to the persistent catalog/account store. The store itself (Postgres in
/// production) is an external collaborator; the engine only depends on this
/// trait.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn item(&self, item_id: Uuid) -> Result<Option<CatalogItem>, StoreError>;

    async fn items(&self, item_ids: &[Uuid]) -> Result<Vec<CatalogItem>, StoreError>;

    async fn all_items(&self) -> Result<Vec<CatalogItem>, StoreError>;

    /// Most recent interactions for a user, newest first, bounded by `limit`.
    async fn recent_interactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<InteractionEvent>, StoreError>;

    /// All interactions at or after `since`, across users.
    async fn interactions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<InteractionEvent>, StoreError>;

    /// Interactions touching a single item; source data for the item->users
    /// inverted index used by user similarity.
    async fn item_interactions(&self, item_id: Uuid) -> Result<Vec<InteractionEvent>, StoreError>;

    async fn active_experiment(&self, name: &str) -> Result<Option<Experiment>, StoreError>;

    async fn insert_experiment(&self, experiment: &Experiment) -> Result<(), StoreError>;

    async fn assignment(
        &self,
        user_id: Uuid,
        experiment_name: &str,
    ) -> Result<Option<ExperimentAssignment>, StoreError>;

    async fn insert_assignment(
        &self,
        assignment: &ExperimentAssignment,
    ) -> Result<(), StoreError>;

    async fn insert_recommendation(&self, rec: &Recommendation) -> Result<(), StoreError>;

    async fn recommendation(&self, id: Uuid) -> Result<Option<Recommendation>, StoreError>;

    /// Sets `clicked_at` if it is not already set.
    async fn mark_recommendation_clicked(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Sets `purchased_at` if it is not already set.
    async fn mark_recommendation_purchased(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn record_search_query(&self, query: &str) -> Result<(), StoreError>;

    /// Popular historical queries containing `fragment`, most frequent first.
    async fn popular_queries(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<SearchQueryStat>, StoreError>;

    /// Users with any interaction history; drives batch generation.
    async fn active_user_ids(&self, limit: usize) -> Result<Vec<Uuid>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
