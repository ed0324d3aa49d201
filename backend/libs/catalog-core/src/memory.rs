use crate::cache::Cache;
use crate::error::{CacheError, StoreError};
use crate::models::{
    CatalogItem, Experiment, ExperimentAssignment, InteractionEvent, Recommendation,
    SearchQueryStat,
};
use crate::store::CatalogStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// In-memory [`CatalogStore`] used by tests and local development. Reads and
/// writes can be failed on demand to exercise the degraded paths.
#[derive(Default)]
pub struct InMemoryStore {
    items: DashMap<Uuid, CatalogItem>,
    interactions: RwLock<Vec<InteractionEvent>>,
    experiments: DashMap<String, Experiment>,
    assignments: DashMap<(Uuid, String), ExperimentAssignment>,
    recommendations: DashMap<Uuid, Recommendation>,
    query_counts: DashMap<String, i64>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    history_failures: DashSet<Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, item: CatalogItem) {
        self.items.insert(item.id, item);
    }

    pub fn remove_item(&self, item_id: Uuid) {
        self.items.remove(&item_id);
    }

    pub fn add_interaction(&self, event: InteractionEvent) {
        self.interactions
            .write()
            .expect("interaction lock poisoned")
            .push(event);
    }

    /// When set, assignment and recommendation inserts fail with
    /// [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// When set, every read fails with [`StoreError::Unavailable`];
    /// `ping` still answers.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fails `recent_interactions` for one user while everything else keeps
    /// working.
    pub fn set_fail_history(&self, user_id: Uuid) {
        self.history_failures.insert(user_id);
    }

    pub fn recommendation_count(&self) -> usize {
        self.recommendations.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn item(&self, item_id: Uuid) -> Result<Option<CatalogItem>, StoreError> {
        self.check_readable()?;
        Ok(self.items.get(&item_id).map(|i| i.clone()))
    }

    async fn items(&self, item_ids: &[Uuid]) -> Result<Vec<CatalogItem>, StoreError> {
        self.check_readable()?;
        Ok(item_ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|i| i.clone()))
            .collect())
    }

    async fn all_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        self.check_readable()?;
        Ok(self.items.iter().map(|i| i.clone()).collect())
    }

    async fn recent_interactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<InteractionEvent>, StoreError> {
        self.check_readable()?;
        if self.history_failures.contains(&user_id) {
            return Err(StoreError::Unavailable(format!(
                "history unavailable for user {}",
                user_id
            )));
        }
        let interactions = self.interactions.read().expect("interaction lock poisoned");
        let mut events: Vec<InteractionEvent> = interactions
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }

    async fn interactions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<InteractionEvent>, StoreError> {
        self.check_readable()?;
        let interactions = self.interactions.read().expect("interaction lock poisoned");
        Ok(interactions
            .iter()
            .filter(|e| e.created_at >= since)
            .cloned()
            .collect())
    }

    async fn item_interactions(&self, item_id: Uuid) -> Result<Vec<InteractionEvent>, StoreError> {
        self.check_readable()?;
        let interactions = self.interactions.read().expect("interaction lock poisoned");
        Ok(interactions
            .iter()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn active_experiment(&self, name: &str) -> Result<Option<Experiment>, StoreError> {
        self.check_readable()?;
        Ok(self
            .experiments
            .get(name)
            .filter(|e| e.active)
            .map(|e| e.clone()))
    }

    async fn insert_experiment(&self, experiment: &Experiment) -> Result<(), StoreError> {
        self.check_writable()?;
        self.experiments
            .insert(experiment.name.clone(), experiment.clone());
        Ok(())
    }

    async fn assignment(
        &self,
        user_id: Uuid,
        experiment_name: &str,
    ) -> Result<Option<ExperimentAssignment>, StoreError> {
        self.check_readable()?;
        Ok(self
            .assignments
            .get(&(user_id, experiment_name.to_string()))
            .map(|a| a.clone()))
    }

    async fn insert_assignment(
        &self,
        assignment: &ExperimentAssignment,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let key = (assignment.user_id, assignment.experiment_name.clone());
        if self.assignments.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "assignment already exists for user {}",
                assignment.user_id
            )));
        }
        self.assignments.insert(key, assignment.clone());
        Ok(())
    }

    async fn insert_recommendation(&self, rec: &Recommendation) -> Result<(), StoreError> {
        self.check_writable()?;
        self.recommendations.insert(rec.id, rec.clone());
        Ok(())
    }

    async fn recommendation(&self, id: Uuid) -> Result<Option<Recommendation>, StoreError> {
        self.check_readable()?;
        Ok(self.recommendations.get(&id).map(|r| r.clone()))
    }

    async fn mark_recommendation_clicked(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rec = self
            .recommendations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("recommendation {}", id)))?;
        if rec.clicked_at.is_none() {
            rec.clicked_at = Some(at);
        }
        Ok(())
    }

    async fn mark_recommendation_purchased(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rec = self
            .recommendations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("recommendation {}", id)))?;
        if rec.purchased_at.is_none() {
            rec.purchased_at = Some(at);
        }
        Ok(())
    }

    async fn record_search_query(&self, query: &str) -> Result<(), StoreError> {
        *self.query_counts.entry(query.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn popular_queries(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<SearchQueryStat>, StoreError> {
        self.check_readable()?;
        let mut stats: Vec<SearchQueryStat> = self
            .query_counts
            .iter()
            .filter(|e| e.key().contains(fragment))
            .map(|e| SearchQueryStat {
                query: e.key().clone(),
                count: *e.value(),
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        stats.truncate(limit);
        Ok(stats)
    }

    async fn active_user_ids(&self, limit: usize) -> Result<Vec<Uuid>, StoreError> {
        self.check_readable()?;
        let interactions = self.interactions.read().expect("interaction lock poisoned");
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut users = Vec::new();
        for event in interactions.iter() {
            if seen.insert(event.user_id) {
                users.push(event.user_id);
                if users.len() >= limit {
                    break;
                }
            }
        }
        Ok(users)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory [`Cache`] with per-key expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            let (value, deadline) = entry.value();
            if Instant::now() < *deadline {
                return Ok(Some(value.clone()));
            }
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheExt;
    use crate::models::{Grade, InteractionKind};

    fn sample_item(name: &str) -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            provider: "Uji Tea Co".to_string(),
            origin: "Uji, Kyoto".to_string(),
            grade: Grade::Ceremonial,
            flavor_tags: vec!["umami".to_string()],
            price: 38.0,
            size: "30g".to_string(),
            in_stock: true,
            view_count: 0,
            purchase_count: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn store_roundtrip() {
        let store = InMemoryStore::new();
        let item = sample_item("Morning Blend");
        let item_id = item.id;
        store.add_item(item);

        let fetched = store.item(item_id).await.unwrap();
        assert_eq!(fetched.unwrap().name, "Morning Blend");
        assert!(store.item(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_interactions_ordered_and_bounded() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        for i in 0..5 {
            store.add_interaction(InteractionEvent {
                user_id: user,
                item_id: Uuid::new_v4(),
                kind: InteractionKind::View,
                created_at: now - chrono::Duration::minutes(i),
            });
        }

        let events = store.recent_interactions(user, 3).await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].created_at >= events[1].created_at);
    }

    #[tokio::test]
    async fn read_failures_toggle_on_and_off() {
        let store = InMemoryStore::new();
        store.add_item(sample_item("Morning Blend"));

        store.set_fail_reads(true);
        assert!(matches!(
            store.all_items().await,
            Err(StoreError::Unavailable(_))
        ));
        store.ping().await.unwrap();

        store.set_fail_reads(false);
        assert_eq!(store.all_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_failure_is_scoped_to_one_user() {
        let store = InMemoryStore::new();
        let broken = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        store.add_interaction(InteractionEvent {
            user_id: healthy,
            item_id: Uuid::new_v4(),
            kind: InteractionKind::View,
            created_at: Utc::now(),
        });

        store.set_fail_history(broken);
        assert!(store.recent_interactions(broken, 10).await.is_err());
        assert_eq!(store.recent_interactions(healthy, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cache_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set_json("k", &42u32, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(cache.get_json::<u32>("k").await.unwrap(), Some(42));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get_json::<u32>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn prefix_delete() {
        let cache = MemoryCache::new();
        cache
            .set_raw("recs:a", "1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set_raw("recs:b", "2".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set_raw("profile:a", "3".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let removed = cache.delete_prefix("recs:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get_raw("profile:a").await.unwrap().is_some());
    }
}
