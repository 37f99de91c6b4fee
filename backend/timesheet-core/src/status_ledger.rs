// src/status_ledger.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::model::{Week, WeekId};
use crate::week_catalog::WeekCatalog;

// --- Status vocabulary ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeekStatus {
    #[default]
    Unconfirmed,
    UnderReview,
    Accepted,
    NeedsRevision,
}

impl WeekStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStatus::Unconfirmed => "unconfirmed",
            WeekStatus::UnderReview => "under-review",
            WeekStatus::Accepted => "accepted",
            WeekStatus::NeedsRevision => "needs-revision",
        }
    }

    /// Weeks in the "submitted" set: handed in and not sent back.
    pub fn is_submitted(&self) -> bool {
        matches!(self, WeekStatus::UnderReview | WeekStatus::Accepted)
    }

    /// Hours may only be edited while the owner still holds the week.
    pub fn is_editable(&self) -> bool {
        matches!(self, WeekStatus::Unconfirmed | WeekStatus::NeedsRevision)
    }
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Submit,
    Approve,
    Reject,
    AdminRevert,
}

impl TransitionKind {
    pub fn allowed_from(&self) -> &'static [WeekStatus] {
        match self {
            TransitionKind::Submit => &[WeekStatus::Unconfirmed, WeekStatus::NeedsRevision],
            TransitionKind::Approve | TransitionKind::Reject => &[WeekStatus::UnderReview],
            TransitionKind::AdminRevert => &[WeekStatus::Accepted],
        }
    }

    pub fn target(&self) -> WeekStatus {
        match self {
            TransitionKind::Submit => WeekStatus::UnderReview,
            TransitionKind::Approve => WeekStatus::Accepted,
            TransitionKind::Reject => WeekStatus::NeedsRevision,
            TransitionKind::AdminRevert => WeekStatus::Unconfirmed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Submit => "submit",
            TransitionKind::Approve => "approve",
            TransitionKind::Reject => "reject",
            TransitionKind::AdminRevert => "admin-revert",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Ledger ---

/// Current status per week for one user. Missing rows read as `Unconfirmed`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusLedger {
    rows: HashMap<WeekId, WeekStatus>,
}

impl StatusLedger {
    pub fn new(rows: HashMap<WeekId, WeekStatus>) -> Self {
        Self { rows }
    }

    pub fn status(&self, week_id: &str) -> WeekStatus {
        self.rows.get(week_id).copied().unwrap_or_default()
    }

    pub fn has_row(&self, week_id: &str) -> bool {
        self.rows.contains_key(week_id)
    }

    pub fn set(&mut self, week_id: &str, status: WeekStatus) {
        self.rows.insert(week_id.to_string(), status);
    }

    /// Weeks currently under review or accepted, in catalog order.
    pub fn submitted_weeks<'a>(&self, catalog: &'a WeekCatalog) -> Vec<&'a Week> {
        catalog
            .weeks()
            .iter()
            .filter(|week| self.status(&week.id).is_submitted())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Week;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn week(id: &str, from: &str, to: &str) -> Week {
        Week {
            id: id.to_string(),
            name: id.to_string(),
            period_from: NaiveDate::parse_from_str(from, "%Y-%m-%d").unwrap(),
            period_to: NaiveDate::parse_from_str(to, "%Y-%m-%d").unwrap(),
            required_hours: dec!(40),
        }
    }

    #[test]
    fn missing_row_reads_as_unconfirmed() {
        let ledger = StatusLedger::default();
        assert_eq!(ledger.status("W1"), WeekStatus::Unconfirmed);
        assert!(!ledger.has_row("W1"));
    }

    #[test]
    fn set_overwrites_the_single_row() {
        let mut ledger = StatusLedger::default();
        ledger.set("W1", WeekStatus::UnderReview);
        ledger.set("W1", WeekStatus::Accepted);
        assert_eq!(ledger.status("W1"), WeekStatus::Accepted);
        assert_eq!(ledger.rows.len(), 1);
    }

    #[test]
    fn submitted_weeks_follow_catalog_order() {
        let catalog = WeekCatalog::new(vec![
            week("W3", "2025-01-20", "2025-01-26"),
            week("W1", "2025-01-06", "2025-01-12"),
            week("W2", "2025-01-13", "2025-01-19"),
        ])
        .unwrap();
        let mut ledger = StatusLedger::default();
        ledger.set("W3", WeekStatus::UnderReview);
        ledger.set("W1", WeekStatus::Accepted);
        ledger.set("W2", WeekStatus::NeedsRevision);

        let ids: Vec<&str> = ledger
            .submitted_weeks(&catalog)
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(ids, vec!["W1", "W3"]);
    }

    #[test]
    fn transition_vocabulary_is_fixed() {
        assert_eq!(TransitionKind::Submit.target(), WeekStatus::UnderReview);
        assert_eq!(TransitionKind::Approve.target(), WeekStatus::Accepted);
        assert_eq!(TransitionKind::Reject.target(), WeekStatus::NeedsRevision);
        assert_eq!(TransitionKind::AdminRevert.target(), WeekStatus::Unconfirmed);
        assert_eq!(
            TransitionKind::AdminRevert.allowed_from(),
            &[WeekStatus::Accepted]
        );
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&WeekStatus::NeedsRevision).unwrap();
        assert_eq!(json, "\"needs-revision\"");
        let parsed: WeekStatus = serde_json::from_str("\"under-review\"").unwrap();
        assert_eq!(parsed, WeekStatus::UnderReview);
    }
}
