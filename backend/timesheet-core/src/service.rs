// src/service.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::approval_engine::{
    Action, ActionKind, Actor, ApprovalEngine, Decision, TransitionRequest, UserSnapshot,
    WeekSummary,
};
use crate::errors::{RejectionReason, TimesheetError};
use crate::model::{HourEntry, User, UserId, Week, WeekId};
use crate::snapshot_cache::SnapshotCache;
use crate::status_ledger::WeekStatus;
use crate::store::TimesheetStore;
use crate::week_catalog::WeekCatalog;

pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

// --- Results ---

/// One committed change, kept for later inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: UserId,
    pub week_id: WeekId,
    pub actor: Actor,
    pub action: Action,
    pub via_override: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Applied(AuditRecord),
    Unchanged { status: WeekStatus },
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekDetail {
    #[serde(flatten)]
    pub summary: WeekSummary,
    pub entries: Vec<HourEntry>,
}

// --- Service ---

/// Loads snapshots, asks the engine, commits what it decides and keeps the
/// cache in step with the store.
///
/// The audit log is an in-process ring: only the latest `audit_capacity`
/// records are kept.
pub struct TimesheetService {
    store: Arc<dyn TimesheetStore>,
    cache: SnapshotCache,
    audit: Mutex<VecDeque<AuditRecord>>,
    audit_capacity: usize,
}

impl TimesheetService {
    pub fn new(store: Arc<dyn TimesheetStore>) -> Self {
        Self::with_audit_capacity(store, DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_audit_capacity(store: Arc<dyn TimesheetStore>, audit_capacity: usize) -> Self {
        Self {
            cache: SnapshotCache::new(store.clone()),
            store,
            audit: Mutex::new(VecDeque::new()),
            audit_capacity,
        }
    }

    pub async fn weeks(&self) -> Result<Vec<Week>, TimesheetError> {
        Ok(self.cache.catalog().await?.weeks().to_vec())
    }

    /// Snapshot with hours for every obligated week.
    async fn full_snapshot(
        &self,
        catalog: &WeekCatalog,
        user_id: &str,
    ) -> Result<UserSnapshot, TimesheetError> {
        let user = self.cache.user(user_id).await?;
        let week_ids: Vec<&str> = catalog
            .weeks_from(user.first_week_id.as_deref())?
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        self.cache.snapshot(user_id, &week_ids).await
    }

    /// Snapshot with hours for `week_id` only, or none when the week is unknown.
    async fn week_snapshot(
        &self,
        catalog: &WeekCatalog,
        user_id: &str,
        week_id: &str,
    ) -> Result<UserSnapshot, TimesheetError> {
        match catalog.find(week_id) {
            Some(week) => self.cache.snapshot(user_id, &[week.id.as_str()]).await,
            None => self.cache.snapshot(user_id, &[]).await,
        }
    }

    pub async fn overview(&self, user_id: &str) -> Result<Vec<WeekSummary>, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.full_snapshot(&catalog, user_id).await?;
        Ok(ApprovalEngine::new(&catalog, &snapshot).overview()?)
    }

    pub async fn week_detail(
        &self,
        user_id: &str,
        week_id: &str,
    ) -> Result<WeekDetail, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.week_snapshot(&catalog, user_id, week_id).await?;
        let summary = ApprovalEngine::new(&catalog, &snapshot).week_summary(week_id)?;
        Ok(WeekDetail {
            summary,
            entries: snapshot.hours.week(week_id).entries(),
        })
    }

    pub async fn first_actionable_week(
        &self,
        user_id: &str,
        kind: ActionKind,
    ) -> Result<Option<Week>, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.cache.snapshot(user_id, &[]).await?;
        let engine = ApprovalEngine::new(&catalog, &snapshot);
        Ok(engine.first_actionable_week(kind)?.cloned())
    }

    pub async fn submitted_weeks(&self, user_id: &str) -> Result<Vec<Week>, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.cache.snapshot(user_id, &[]).await?;
        let engine = ApprovalEngine::new(&catalog, &snapshot);
        Ok(engine.submitted_weeks().into_iter().cloned().collect())
    }

    pub async fn transition(
        &self,
        user_id: &str,
        request: TransitionRequest,
    ) -> Result<Outcome, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.week_snapshot(&catalog, user_id, &request.week_id).await?;
        let acting = self.cache.user(request.actor.acting_user_id()).await?;

        info!(
            "{} requested {} on week {} of {}",
            acting.id, request.kind, request.week_id, user_id
        );
        let decision = ApprovalEngine::new(&catalog, &snapshot).decide(&acting, &request)?;
        self.apply(&acting, &request.actor, decision).await
    }

    pub async fn log_hours(
        &self,
        user_id: &str,
        week_id: &str,
        actor: Actor,
        entries: Vec<HourEntry>,
    ) -> Result<Outcome, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.week_snapshot(&catalog, user_id, week_id).await?;
        let acting = self.cache.user(actor.acting_user_id()).await?;

        let decision = ApprovalEngine::new(&catalog, &snapshot)
            .decide_hours(&acting, &actor, week_id, &entries)?;
        self.apply(&acting, &actor, decision).await
    }

    pub async fn set_percentage(
        &self,
        user_id: &str,
        week_id: &str,
        actor: Actor,
        percentage: Decimal,
    ) -> Result<Outcome, TimesheetError> {
        let catalog = self.cache.catalog().await?;
        let snapshot = self.cache.snapshot(user_id, &[]).await?;
        let acting = self.cache.user(actor.acting_user_id()).await?;

        let decision = ApprovalEngine::new(&catalog, &snapshot)
            .decide_percentage(&acting, &actor, week_id, percentage)?;
        self.apply(&acting, &actor, decision).await
    }

    /// Retained audit records, oldest first.
    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit.lock().await.iter().cloned().collect()
    }

    /// Forgets every cached snapshot, including the catalog.
    pub async fn refresh(&self) {
        self.cache.clear_all().await;
    }

    async fn apply(
        &self,
        acting: &User,
        actor: &Actor,
        decision: Decision,
    ) -> Result<Outcome, TimesheetError> {
        let plan = match decision {
            Decision::Rejected(reason) => {
                info!("Request by {} rejected: {}", acting.id, reason);
                return Ok(Outcome::Rejected(reason));
            }
            Decision::Unchanged { status } => {
                info!("Request by {} left week unchanged ({})", acting.id, status);
                return Ok(Outcome::Unchanged { status });
            }
            Decision::Commit(plan) => plan,
        };

        if let Err(e) = self.store.commit(&plan.intents).await {
            error!(
                "Commit of {} intents for {} week {} failed: {}",
                plan.intents.len(),
                plan.user_id,
                plan.week_id,
                e
            );
            return Err(e.into());
        }
        self.cache.invalidate_user(&plan.user_id).await;
        self.cache.invalidate_week(&plan.user_id, &plan.week_id).await;

        let record = AuditRecord {
            user_id: plan.user_id,
            week_id: plan.week_id,
            actor: actor.clone(),
            action: plan.action,
            via_override: plan.via_override,
            recorded_at: Utc::now(),
        };
        if record.via_override {
            warn!(
                "Admin override by {} on week {} of {}: {:?}",
                acting.id, record.week_id, record.user_id, record.action
            );
        } else {
            info!(
                "Committed {:?} on week {} of {} by {}",
                record.action, record.week_id, record.user_id, acting.id
            );
        }
        let mut audit = self.audit.lock().await;
        if self.audit_capacity > 0 {
            if audit.len() == self.audit_capacity {
                audit.pop_front();
            }
            audit.push_back(record.clone());
        }
        drop(audit);
        Ok(Outcome::Applied(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_ledger::TransitionKind;

    #[test]
    fn outcome_is_tagged_for_clients() {
        let json = serde_json::to_value(Outcome::Unchanged {
            status: WeekStatus::Accepted,
        })
        .unwrap();
        assert_eq!(json["outcome"], "unchanged");
        assert_eq!(json["detail"]["status"], "accepted");

        let json = serde_json::to_value(Outcome::Rejected(RejectionReason::NotAuthorized)).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["detail"]["reason"], "NOT_AUTHORIZED");
    }

    #[test]
    fn audit_record_names_the_transition() {
        let record = AuditRecord {
            user_id: "employee".to_string(),
            week_id: "W1".to_string(),
            actor: Actor::Manager {
                manager_id: "manager".to_string(),
            },
            action: Action::Transition {
                kind: TransitionKind::Approve,
                from: WeekStatus::UnderReview,
                to: WeekStatus::Accepted,
            },
            via_override: false,
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"]["type"], "transition");
        assert_eq!(json["action"]["kind"], "approve");
        assert_eq!(json["actor"]["as"], "manager");
    }

    #[tokio::test]
    async fn audit_log_keeps_only_the_latest_records() {
        use crate::memory_store::InMemoryStore;
        use rust_decimal_macros::dec;

        let store = Arc::new(InMemoryStore::demo().await);
        let service = TimesheetService::with_audit_capacity(store, 2);
        let admin = Actor::Admin {
            admin_id: "admin".to_string(),
            override_rules: false,
        };
        for week_id in ["W1", "W2", "W3"] {
            let outcome = service
                .set_percentage("employee", week_id, admin.clone(), dec!(50))
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::Applied(_)));
        }

        let weeks: Vec<WeekId> = service
            .audit_log()
            .await
            .into_iter()
            .map(|record| record.week_id)
            .collect();
        assert_eq!(weeks, vec!["W2".to_string(), "W3".to_string()]);
    }
}
