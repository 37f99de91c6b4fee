// src/store.rs
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::PersistenceError;
use crate::model::{ClientId, HourKey, MediaTypeId, User, UserId, Week, WeekId};
use crate::status_ledger::WeekStatus;

/// A ledger write the engine asks the store to commit. Every intent is an
/// upsert on its natural key; hours of exactly 0 mean "delete the row".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationIntent {
    UpsertStatus {
        user_id: UserId,
        week_id: WeekId,
        status: WeekStatus,
    },
    UpsertPercentage {
        user_id: UserId,
        week_id: WeekId,
        percentage: Decimal,
    },
    UpsertHours {
        user_id: UserId,
        week_id: WeekId,
        client_id: ClientId,
        media_type_id: MediaTypeId,
        hours: Decimal,
    },
}

impl MutationIntent {
    pub fn user_id(&self) -> &str {
        match self {
            MutationIntent::UpsertStatus { user_id, .. }
            | MutationIntent::UpsertPercentage { user_id, .. }
            | MutationIntent::UpsertHours { user_id, .. } => user_id,
        }
    }

    pub fn week_id(&self) -> &str {
        match self {
            MutationIntent::UpsertStatus { week_id, .. }
            | MutationIntent::UpsertPercentage { week_id, .. }
            | MutationIntent::UpsertHours { week_id, .. } => week_id,
        }
    }
}

/// The external relational backend, reached through request/response calls.
///
/// `commit` must apply the whole batch or nothing; the store enforces
/// uniqueness of `(user, week[, client, media type])`.
#[async_trait]
pub trait TimesheetStore: Send + Sync {
    /// All custom weeks. Order is not relied upon; the catalog sorts.
    async fn load_weeks(&self) -> Result<Vec<Week>, PersistenceError>;

    async fn load_user(&self, user_id: &str) -> Result<Option<User>, PersistenceError>;

    async fn load_statuses(
        &self,
        user_id: &str,
    ) -> Result<HashMap<WeekId, WeekStatus>, PersistenceError>;

    async fn load_percentages(
        &self,
        user_id: &str,
    ) -> Result<HashMap<WeekId, Decimal>, PersistenceError>;

    async fn load_hours(
        &self,
        user_id: &str,
        week_id: &str,
    ) -> Result<HashMap<HourKey, Decimal>, PersistenceError>;

    async fn commit(&self, intents: &[MutationIntent]) -> Result<(), PersistenceError>;
}
