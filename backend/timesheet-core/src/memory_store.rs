// src/memory_store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::PersistenceError;
use crate::model::{HourKey, Role, User, UserId, Week, WeekId};
use crate::status_ledger::WeekStatus;
use crate::store::{MutationIntent, TimesheetStore};

#[derive(Debug, Clone, Default)]
struct StoreState {
    weeks: Vec<Week>,
    users: HashMap<UserId, User>,
    statuses: HashMap<(UserId, WeekId), WeekStatus>,
    percentages: HashMap<(UserId, WeekId), Decimal>,
    hours: HashMap<(UserId, WeekId), HashMap<HourKey, Decimal>>,
}

impl StoreState {
    fn has_week(&self, week_id: &str) -> bool {
        self.weeks.iter().any(|w| w.id == week_id)
    }

    fn apply(&mut self, intent: &MutationIntent) -> Result<(), PersistenceError> {
        // Foreign keys, as the relational backend would enforce them
        if !self.users.contains_key(intent.user_id()) {
            return Err(PersistenceError::CommitFailed(format!(
                "unknown user {}",
                intent.user_id()
            )));
        }
        if !self.has_week(intent.week_id()) {
            return Err(PersistenceError::CommitFailed(format!(
                "unknown week {}",
                intent.week_id()
            )));
        }

        match intent {
            MutationIntent::UpsertStatus {
                user_id,
                week_id,
                status,
            } => {
                self.statuses
                    .insert((user_id.clone(), week_id.clone()), *status);
            }
            MutationIntent::UpsertPercentage {
                user_id,
                week_id,
                percentage,
            } => {
                self.percentages
                    .insert((user_id.clone(), week_id.clone()), *percentage);
            }
            MutationIntent::UpsertHours {
                user_id,
                week_id,
                client_id,
                media_type_id,
                hours,
            } => {
                let key = HourKey::new(client_id, media_type_id);
                let rows = self
                    .hours
                    .entry((user_id.clone(), week_id.clone()))
                    .or_default();
                if hours.is_zero() {
                    rows.remove(&key);
                } else {
                    rows.insert(key, *hours);
                }
            }
        }
        Ok(())
    }
}

/// Store kept in process memory. Used by tests and by the server when no
/// backend is configured. Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_next_commit: Arc<Mutex<bool>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_week(&self, week: Week) {
        self.state.lock().await.weeks.push(week);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id.clone(), user);
    }

    pub async fn seed_status(&self, user_id: &str, week_id: &str, status: WeekStatus) {
        self.state
            .lock()
            .await
            .statuses
            .insert((user_id.to_string(), week_id.to_string()), status);
    }

    pub async fn seed_percentage(&self, user_id: &str, week_id: &str, percentage: Decimal) {
        self.state
            .lock()
            .await
            .percentages
            .insert((user_id.to_string(), week_id.to_string()), percentage);
    }

    /// Writes a raw hour row, zero included. Lets tests reproduce stale rows
    /// left behind by older writers.
    pub async fn seed_hours(
        &self,
        user_id: &str,
        week_id: &str,
        client_id: &str,
        media_type_id: &str,
        hours: Decimal,
    ) {
        self.state
            .lock()
            .await
            .hours
            .entry((user_id.to_string(), week_id.to_string()))
            .or_default()
            .insert(HourKey::new(client_id, media_type_id), hours);
    }

    /// Stored status row, `None` when the week was never written.
    pub async fn status_row(&self, user_id: &str, week_id: &str) -> Option<WeekStatus> {
        self.state
            .lock()
            .await
            .statuses
            .get(&(user_id.to_string(), week_id.to_string()))
            .copied()
    }

    pub async fn hour_rows(&self, user_id: &str, week_id: &str) -> HashMap<HourKey, Decimal> {
        self.state
            .lock()
            .await
            .hours
            .get(&(user_id.to_string(), week_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Makes the next `commit` fail without applying anything.
    pub async fn fail_next_commit(&self) {
        *self.fail_next_commit.lock().await = true;
    }

    /// Four January 2025 weeks and one small team: `employee` reports to
    /// `manager`, has `head` as user head, and `admin` can override.
    pub async fn demo() -> Self {
        let store = Self::new();
        let weeks = [
            ("W1", "Week 2", (2025, 1, 6), (2025, 1, 12)),
            ("W2", "Week 3", (2025, 1, 13), (2025, 1, 19)),
            ("W3", "Week 4", (2025, 1, 20), (2025, 1, 26)),
            ("W4", "Week 5", (2025, 1, 27), (2025, 1, 31)),
        ];
        for (id, name, from, to) in weeks {
            let (Some(period_from), Some(period_to)) = (
                NaiveDate::from_ymd_opt(from.0, from.1, from.2),
                NaiveDate::from_ymd_opt(to.0, to.1, to.2),
            ) else {
                continue;
            };
            store
                .insert_week(Week {
                    id: id.to_string(),
                    name: name.to_string(),
                    period_from,
                    period_to,
                    required_hours: Decimal::from(40),
                })
                .await;
        }

        store
            .insert_user(
                User::new("employee", Role::User)
                    .managed_by("manager")
                    .headed_by("head")
                    .starting_at("W1"),
            )
            .await;
        store.insert_user(User::new("manager", Role::Manager)).await;
        store.insert_user(User::new("head", Role::User)).await;
        store.insert_user(User::new("admin", Role::Admin)).await;

        info!("Seeded in-memory store with demo weeks and users");
        store
    }
}

#[async_trait]
impl TimesheetStore for InMemoryStore {
    async fn load_weeks(&self) -> Result<Vec<Week>, PersistenceError> {
        Ok(self.state.lock().await.weeks.clone())
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<User>, PersistenceError> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn load_statuses(
        &self,
        user_id: &str,
    ) -> Result<HashMap<WeekId, WeekStatus>, PersistenceError> {
        let state = self.state.lock().await;
        Ok(state
            .statuses
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, week), status)| (week.clone(), *status))
            .collect())
    }

    async fn load_percentages(
        &self,
        user_id: &str,
    ) -> Result<HashMap<WeekId, Decimal>, PersistenceError> {
        let state = self.state.lock().await;
        Ok(state
            .percentages
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, week), pct)| (week.clone(), *pct))
            .collect())
    }

    async fn load_hours(
        &self,
        user_id: &str,
        week_id: &str,
    ) -> Result<HashMap<HourKey, Decimal>, PersistenceError> {
        Ok(self.hour_rows(user_id, week_id).await)
    }

    /// Applies the batch to a staged copy and swaps it in only if every
    /// intent succeeded.
    async fn commit(&self, intents: &[MutationIntent]) -> Result<(), PersistenceError> {
        {
            let mut fail = self.fail_next_commit.lock().await;
            if *fail {
                *fail = false;
                warn!("Injected commit failure, {} intents dropped", intents.len());
                return Err(PersistenceError::CommitFailed(
                    "injected failure".to_string(),
                ));
            }
        }

        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        for intent in intents {
            staged.apply(intent)?;
        }
        *state = staged;
        debug!("Committed batch of {} intents", intents.len());
        Ok(())
    }
}
