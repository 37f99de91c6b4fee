// src/errors.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ClientId, MediaTypeId, UserId, WeekId};
use crate::status_ledger::WeekStatus;

// --- Expected rejections (user-facing, recoverable) ---

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    #[error("Week is not complete: {remaining} hours remaining")]
    IncompleteHours { remaining: Decimal },

    #[error("Earlier week {week_id} is {status} and must be handled first")]
    EarlierWeekBlocking { week_id: WeekId, status: WeekStatus },

    #[error("Actor is not authorized for this action")]
    NotAuthorized,

    #[error("Unknown week: {week_id}")]
    UnknownWeek { week_id: WeekId },

    #[error("Transition not allowed while week is {from}")]
    IllegalTransition { from: WeekStatus },

    #[error("Hours cannot be changed while week is {status}")]
    WeekLocked { status: WeekStatus },

    #[error("Hours must not be negative ({hours} for client {client_id}, media type {media_type_id})")]
    InvalidHours {
        client_id: ClientId,
        media_type_id: MediaTypeId,
        hours: Decimal,
    },

    #[error("Percentage {percentage} is outside 0..=100")]
    InvalidPercentage { percentage: Decimal },
}

// --- Data-integrity failures (fatal to the current operation) ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("Week not found: {0}")]
    Week(WeekId),
    #[error("User not found: {0}")]
    User(UserId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Week {week_id} ends ({period_to}) before it starts ({period_from})")]
    InvertedPeriod {
        week_id: WeekId,
        period_from: NaiveDate,
        period_to: NaiveDate,
    },
    #[error("Week {week_id} runs from {period_from} into another month ({period_to})")]
    CrossesMonth {
        week_id: WeekId,
        period_from: NaiveDate,
        period_to: NaiveDate,
    },
    #[error("Weeks {earlier} and {later} overlap")]
    Overlap { earlier: WeekId, later: WeekId },
    #[error("Duplicate week id: {0}")]
    DuplicateId(WeekId),
    #[error("Week {week_id} has negative required hours ({required_hours})")]
    NegativeRequiredHours {
        week_id: WeekId,
        required_hours: Decimal,
    },
    #[error("Stored percentage {percentage} for {user_id} in week {week_id} is outside 0..=100")]
    PercentageOutOfRange {
        user_id: UserId,
        week_id: WeekId,
        percentage: Decimal,
    },
}

// --- Store collaborator failures ---

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Store rate limit exceeded")]
    RateLimitExceeded,

    #[error("Store API error: Status={status}, Message='{message}'")]
    ApiError { status: u16, message: String },

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// --- Service level ---

#[derive(Error, Debug)]
pub enum TimesheetError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("Week catalog is inconsistent: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejection_reason_carries_a_stable_code() {
        let reason = RejectionReason::EarlierWeekBlocking {
            week_id: "W1".to_string(),
            status: WeekStatus::UnderReview,
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["reason"], "EARLIER_WEEK_BLOCKING");
        assert_eq!(json["week_id"], "W1");
        assert_eq!(json["status"], "under-review");

        let json = serde_json::to_value(RejectionReason::NotAuthorized).unwrap();
        assert_eq!(json["reason"], "NOT_AUTHORIZED");
    }

    #[test]
    fn rejection_message_names_the_blocker() {
        let reason = RejectionReason::IncompleteHours {
            remaining: dec!(8),
        };
        assert_eq!(
            reason.to_string(),
            "Week is not complete: 8 hours remaining"
        );
    }
}
