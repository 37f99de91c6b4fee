// src/snapshot_cache.rs
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::approval_engine::UserSnapshot;
use crate::errors::{NotFound, TimesheetError};
use crate::hours_ledger::WeekHours;
use crate::model::{User, UserId, WeekId};
use crate::percentage_ledger::PercentageLedger;
use crate::status_ledger::StatusLedger;
use crate::store::TimesheetStore;
use crate::week_catalog::WeekCatalog;

#[derive(Debug, Clone)]
struct UserLedgers {
    statuses: StatusLedger,
    percentages: PercentageLedger,
}

/// Read-through cache over the store.
///
/// Entries are loaded on a miss and kept until invalidated; the service
/// invalidates after each committed batch.
pub struct SnapshotCache {
    store: Arc<dyn TimesheetStore>,
    catalog: Mutex<Option<Arc<WeekCatalog>>>,
    users: Mutex<HashMap<UserId, User>>,
    ledgers: Mutex<HashMap<UserId, UserLedgers>>,
    hours: Mutex<HashMap<(UserId, WeekId), WeekHours>>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn TimesheetStore>) -> Self {
        Self {
            store,
            catalog: Mutex::new(None),
            users: Mutex::new(HashMap::new()),
            ledgers: Mutex::new(HashMap::new()),
            hours: Mutex::new(HashMap::new()),
        }
    }

    pub async fn catalog(&self) -> Result<Arc<WeekCatalog>, TimesheetError> {
        if let Some(catalog) = self.catalog.lock().await.as_ref() {
            return Ok(catalog.clone());
        }

        debug!("Cache MISS for week catalog. Loading...");
        let catalog = Arc::new(WeekCatalog::new(self.store.load_weeks().await?)?);

        let mut guard = self.catalog.lock().await;
        let cached = guard.get_or_insert_with(|| {
            info!("Caching week catalog with {} weeks", catalog.len());
            catalog
        });
        Ok(cached.clone())
    }

    pub async fn user(&self, user_id: &str) -> Result<User, TimesheetError> {
        if let Some(user) = self.users.lock().await.get(user_id) {
            return Ok(user.clone());
        }

        debug!("Cache MISS for user {}. Loading...", user_id);
        let user = self
            .store
            .load_user(user_id)
            .await?
            .ok_or_else(|| NotFound::User(user_id.to_string()))?;

        let mut guard = self.users.lock().await;
        Ok(guard.entry(user_id.to_string()).or_insert(user).clone())
    }

    async fn ledgers(&self, user_id: &str) -> Result<UserLedgers, TimesheetError> {
        if let Some(ledgers) = self.ledgers.lock().await.get(user_id) {
            return Ok(ledgers.clone());
        }

        debug!("Cache MISS for ledgers of {}. Loading...", user_id);
        let statuses = StatusLedger::new(self.store.load_statuses(user_id).await?);
        let percentages =
            PercentageLedger::from_rows(user_id, self.store.load_percentages(user_id).await?)?;

        let mut guard = self.ledgers.lock().await;
        let cached = guard
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedgers {
                statuses,
                percentages,
            });
        Ok(cached.clone())
    }

    async fn week_hours(&self, user_id: &str, week_id: &str) -> Result<WeekHours, TimesheetError> {
        let key = (user_id.to_string(), week_id.to_string());
        if let Some(hours) = self.hours.lock().await.get(&key) {
            return Ok(hours.clone());
        }

        let hours = WeekHours::from_rows(self.store.load_hours(user_id, week_id).await?);

        let mut guard = self.hours.lock().await;
        Ok(guard.entry(key).or_insert(hours).clone())
    }

    /// Snapshot of `user_id` with hours loaded for `week_ids`. Weeks not
    /// listed read as having no hours.
    pub async fn snapshot(
        &self,
        user_id: &str,
        week_ids: &[&str],
    ) -> Result<UserSnapshot, TimesheetError> {
        let user = self.user(user_id).await?;
        let ledgers = self.ledgers(user_id).await?;
        let mut snapshot = UserSnapshot::new(user);
        snapshot.statuses = ledgers.statuses;
        snapshot.percentages = ledgers.percentages;
        for week_id in week_ids {
            let hours = self.week_hours(user_id, week_id).await?;
            snapshot.hours.insert_week(week_id, hours);
        }
        Ok(snapshot)
    }

    /// Drops cached statuses and percentages for one user.
    pub async fn invalidate_user(&self, user_id: &str) {
        if self.ledgers.lock().await.remove(user_id).is_some() {
            debug!("Invalidated ledgers for {}", user_id);
        }
    }

    pub async fn invalidate_week(&self, user_id: &str, week_id: &str) {
        self.hours
            .lock()
            .await
            .remove(&(user_id.to_string(), week_id.to_string()));
    }

    pub async fn clear_all(&self) {
        *self.catalog.lock().await = None;
        self.users.lock().await.clear();
        self.ledgers.lock().await.clear();
        self.hours.lock().await.clear();
        info!("Snapshot cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CatalogError;
    use crate::memory_store::InMemoryStore;
    use crate::status_ledger::WeekStatus;
    use rust_decimal_macros::dec;

    async fn cache() -> (InMemoryStore, SnapshotCache) {
        let store = InMemoryStore::demo().await;
        let cache = SnapshotCache::new(Arc::new(store.clone()));
        (store, cache)
    }

    #[tokio::test]
    async fn snapshot_is_served_from_cache_until_invalidated() {
        let (store, cache) = cache().await;
        let first = cache.snapshot("employee", &["W1"]).await.unwrap();
        assert_eq!(first.statuses.status("W1"), WeekStatus::Unconfirmed);

        // Written behind the cache's back
        store.seed_status("employee", "W1", WeekStatus::Accepted).await;
        let stale = cache.snapshot("employee", &["W1"]).await.unwrap();
        assert_eq!(stale.statuses.status("W1"), WeekStatus::Unconfirmed);

        cache.invalidate_user("employee").await;
        let fresh = cache.snapshot("employee", &["W1"]).await.unwrap();
        assert_eq!(fresh.statuses.status("W1"), WeekStatus::Accepted);
    }

    #[tokio::test]
    async fn week_hours_invalidate_per_week() {
        let (store, cache) = cache().await;
        cache.snapshot("employee", &["W1", "W2"]).await.unwrap();

        store.seed_hours("employee", "W1", "acme", "print", dec!(8)).await;
        store.seed_hours("employee", "W2", "acme", "print", dec!(8)).await;
        cache.invalidate_week("employee", "W1").await;

        let snapshot = cache.snapshot("employee", &["W1", "W2"]).await.unwrap();
        assert_eq!(snapshot.hours.total_hours("W1"), dec!(8));
        assert_eq!(snapshot.hours.total_hours("W2"), dec!(0));
    }

    #[tokio::test]
    async fn out_of_range_percentage_rows_are_refused() {
        let (store, cache) = cache().await;
        store.seed_percentage("employee", "W2", dec!(250)).await;
        let err = cache.snapshot("employee", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            TimesheetError::Catalog(CatalogError::PercentageOutOfRange { week_id, .. }) if week_id == "W2"
        ));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (_store, cache) = cache().await;
        let err = cache.snapshot("ghost", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            TimesheetError::NotFound(NotFound::User(id)) if id == "ghost"
        ));
    }

    #[tokio::test]
    async fn clear_all_reloads_catalog() {
        let (store, cache) = cache().await;
        assert_eq!(cache.catalog().await.unwrap().len(), 4);

        store
            .insert_week(crate::model::Week {
                id: "W5".to_string(),
                name: "Week 6".to_string(),
                period_from: chrono::NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
                period_to: chrono::NaiveDate::from_ymd_opt(2025, 2, 9).unwrap(),
                required_hours: dec!(40),
            })
            .await;
        assert_eq!(cache.catalog().await.unwrap().len(), 4);

        cache.clear_all().await;
        assert_eq!(cache.catalog().await.unwrap().len(), 5);
    }
}
