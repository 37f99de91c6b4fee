// src/approval_engine.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::errors::{NotFound, RejectionReason};
use crate::hours_ledger::{HoursLedger, WeekHours};
use crate::model::{HourEntry, HourKey, Role, User, UserId, Week, WeekId};
use crate::percentage_ledger::{is_valid_percentage, PercentageLedger};
use crate::status_ledger::{StatusLedger, TransitionKind, WeekStatus};
use crate::store::MutationIntent;
use crate::week_catalog::WeekCatalog;

// --- Actors ---

/// Who is asking, and in which capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "as", rename_all = "kebab-case")]
pub enum Actor {
    Owner {
        user_id: UserId,
    },
    Manager {
        manager_id: UserId,
    },
    UserHead {
        head_id: UserId,
    },
    Admin {
        admin_id: UserId,
        #[serde(default, rename = "override")]
        override_rules: bool,
    },
}

impl Actor {
    pub fn acting_user_id(&self) -> &str {
        match self {
            Actor::Owner { user_id } => user_id,
            Actor::Manager { manager_id } => manager_id,
            Actor::UserHead { head_id } => head_id,
            Actor::Admin { admin_id, .. } => admin_id,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(
            self,
            Actor::Admin {
                override_rules: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    Submit,
    Review,
    Revert,
    EditHours,
    SetPercentage,
}

/// The two ordering-gated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Submit,
    Approve,
}

impl ActionKind {
    /// Whether an earlier week in `status` holds this action back.
    /// Submitting needs every earlier week accepted; approving only waits
    /// on earlier weeks still under review.
    pub fn is_blocked_by(&self, status: WeekStatus) -> bool {
        match self {
            ActionKind::Submit => status != WeekStatus::Accepted,
            ActionKind::Approve => status == WeekStatus::UnderReview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub week_id: WeekId,
    pub status: WeekStatus,
}

// --- Snapshot of one user's ledgers ---

#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub user: User,
    pub statuses: StatusLedger,
    pub percentages: PercentageLedger,
    pub hours: HoursLedger,
}

impl UserSnapshot {
    pub fn new(user: User) -> Self {
        Self {
            user,
            statuses: StatusLedger::default(),
            percentages: PercentageLedger::default(),
            hours: HoursLedger::default(),
        }
    }
}

// --- Requests and decisions ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub week_id: WeekId,
    pub kind: TransitionKind,
    pub actor: Actor,
    /// Hours to persist together with a submission.
    #[serde(default)]
    pub draft: Vec<HourEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    Transition {
        kind: TransitionKind,
        from: WeekStatus,
        to: WeekStatus,
    },
    LogHours {
        changed_entries: usize,
    },
    SetPercentage {
        percentage: Decimal,
    },
}

/// An accepted change, ready to be committed as one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub user_id: UserId,
    pub week_id: WeekId,
    pub action: Action,
    pub via_override: bool,
    pub intents: Vec<MutationIntent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Commit(Plan),
    /// The week is already where the request would put it.
    Unchanged { status: WeekStatus },
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekSummary {
    pub week: Week,
    pub status: WeekStatus,
    pub percentage: Decimal,
    pub required_hours: Decimal,
    pub logged_hours: Decimal,
    pub remaining_hours: Decimal,
    pub submit_blocked_by: Option<Blocker>,
}

// --- Engine ---

/// Pure decision logic over one user's snapshot. Holds no state between
/// calls and never touches the store.
pub struct ApprovalEngine<'a> {
    catalog: &'a WeekCatalog,
    snapshot: &'a UserSnapshot,
}

impl<'a> ApprovalEngine<'a> {
    pub fn new(catalog: &'a WeekCatalog, snapshot: &'a UserSnapshot) -> Self {
        Self { catalog, snapshot }
    }

    fn user(&self) -> &User {
        &self.snapshot.user
    }

    fn first_week_id(&self) -> Option<&str> {
        self.snapshot.user.first_week_id.as_deref()
    }

    pub fn status(&self, week_id: &str) -> WeekStatus {
        self.snapshot.statuses.status(week_id)
    }

    pub fn percentage(&self, week_id: &str) -> Result<Decimal, NotFound> {
        self.snapshot.percentages.resolve(self.catalog, week_id)
    }

    pub fn required_hours(&self, week_id: &str) -> Result<Decimal, NotFound> {
        self.snapshot
            .percentages
            .effective_required_hours(self.catalog, week_id)
    }

    pub fn logged_hours(&self, week_id: &str) -> Decimal {
        self.snapshot.hours.total_hours(week_id)
    }

    pub fn remaining_hours(&self, week_id: &str) -> Result<Decimal, NotFound> {
        self.snapshot
            .hours
            .remaining_hours(self.catalog, &self.snapshot.percentages, week_id)
    }

    pub fn is_complete(&self, week_id: &str) -> Result<bool, NotFound> {
        Ok(self.remaining_hours(week_id)?.is_zero())
    }

    /// The user's weeks from `first_week_id` onward.
    pub fn obligated_weeks(&self) -> Result<&'a [Week], NotFound> {
        self.catalog.weeks_from(self.first_week_id())
    }

    /// Obligated weeks before `week_id` whose status holds `kind` back.
    pub fn earlier_blockers(
        &self,
        week_id: &str,
        kind: ActionKind,
    ) -> Result<Vec<Blocker>, NotFound> {
        let earlier = self.catalog.between(self.first_week_id(), week_id)?;
        Ok(earlier
            .iter()
            .filter_map(|week| {
                let status = self.status(&week.id);
                kind.is_blocked_by(status).then(|| Blocker {
                    week_id: week.id.clone(),
                    status,
                })
            })
            .collect())
    }

    /// Earliest obligated week still waiting on `kind`; where a caller should
    /// be sent before anything later can proceed.
    pub fn first_actionable_week(&self, kind: ActionKind) -> Result<Option<&'a Week>, NotFound> {
        Ok(self
            .obligated_weeks()?
            .iter()
            .find(|week| kind.is_blocked_by(self.status(&week.id))))
    }

    pub fn submitted_weeks(&self) -> Vec<&'a Week> {
        self.snapshot.statuses.submitted_weeks(self.catalog)
    }

    pub fn week_summary(&self, week_id: &str) -> Result<WeekSummary, NotFound> {
        let week = self.catalog.get(week_id)?;
        let required_hours = self.required_hours(week_id)?;
        let logged_hours = self.logged_hours(week_id);
        Ok(WeekSummary {
            week: week.clone(),
            status: self.status(week_id),
            percentage: self.percentage(week_id)?,
            required_hours,
            logged_hours,
            remaining_hours: required_hours - logged_hours,
            submit_blocked_by: self
                .earlier_blockers(week_id, ActionKind::Submit)?
                .into_iter()
                .next(),
        })
    }

    pub fn overview(&self) -> Result<Vec<WeekSummary>, NotFound> {
        self.obligated_weeks()?
            .iter()
            .map(|week| self.week_summary(&week.id))
            .collect()
    }

    // --- Decisions ---

    /// Guards run in a fixed order: unknown week, authorization, idempotence,
    /// source state, then completeness and ordering.
    pub fn decide(&self, acting: &User, request: &TransitionRequest) -> Result<Decision, NotFound> {
        let week_id = request.week_id.as_str();
        if self.catalog.find(week_id).is_none() {
            return Ok(reject(RejectionReason::UnknownWeek {
                week_id: week_id.to_string(),
            }));
        }

        let capability = match request.kind {
            TransitionKind::Submit => Capability::Submit,
            TransitionKind::Approve | TransitionKind::Reject => Capability::Review,
            TransitionKind::AdminRevert => Capability::Revert,
        };
        if !self.authorize(acting, &request.actor, capability) {
            debug!(
                "Actor {:?} not authorized to {} week {} of {}",
                request.actor,
                request.kind,
                week_id,
                self.user().id
            );
            return Ok(reject(RejectionReason::NotAuthorized));
        }

        let current = self.status(week_id);
        let target = request.kind.target();
        // Reverting lands on the initial state, so it cannot be idempotent.
        if current == target && request.kind != TransitionKind::AdminRevert {
            if request.kind == TransitionKind::Submit && !request.draft.is_empty() {
                return Ok(self.resubmitted_draft(
                    week_id,
                    current,
                    &request.actor,
                    &request.draft,
                ));
            }
            return Ok(Decision::Unchanged { status: current });
        }
        if !request.kind.allowed_from().contains(&current) {
            return Ok(reject(RejectionReason::IllegalTransition { from: current }));
        }

        let via_override = request.actor.is_override();
        let mut intents = Vec::new();

        match request.kind {
            TransitionKind::Submit => {
                if let Some(reason) = invalid_hours(&request.draft) {
                    return Ok(reject(reason));
                }
                let stored = self.snapshot.hours.week(week_id);
                let drafted = stored.overlay(&request.draft);
                if !via_override {
                    let remaining = self.required_hours(week_id)? - drafted.total();
                    if !remaining.is_zero() {
                        return Ok(reject(RejectionReason::IncompleteHours { remaining }));
                    }
                    if let Some(blocker) = self.first_blocker(week_id, ActionKind::Submit)? {
                        return Ok(reject(blocker));
                    }
                }
                intents.extend(self.hour_intents(week_id, &stored, &drafted, &request.draft));
            }
            TransitionKind::Approve => {
                if let Some(blocker) = self.first_blocker(week_id, ActionKind::Approve)? {
                    return Ok(reject(blocker));
                }
            }
            TransitionKind::Reject | TransitionKind::AdminRevert => {}
        }

        intents.push(MutationIntent::UpsertStatus {
            user_id: self.user().id.clone(),
            week_id: week_id.to_string(),
            status: target,
        });

        Ok(Decision::Commit(Plan {
            user_id: self.user().id.clone(),
            week_id: week_id.to_string(),
            action: Action::Transition {
                kind: request.kind,
                from: current,
                to: target,
            },
            via_override,
            intents,
        }))
    }

    /// Saving hours outside of a submission. Only editable weeks accept
    /// changes, unless an admin overrides.
    pub fn decide_hours(
        &self,
        acting: &User,
        actor: &Actor,
        week_id: &str,
        entries: &[HourEntry],
    ) -> Result<Decision, NotFound> {
        if self.catalog.find(week_id).is_none() {
            return Ok(reject(RejectionReason::UnknownWeek {
                week_id: week_id.to_string(),
            }));
        }
        if !self.authorize(acting, actor, Capability::EditHours) {
            return Ok(reject(RejectionReason::NotAuthorized));
        }
        if let Some(reason) = invalid_hours(entries) {
            return Ok(reject(reason));
        }

        let status = self.status(week_id);
        if !status.is_editable() && !actor.is_override() {
            return Ok(reject(RejectionReason::WeekLocked { status }));
        }

        let stored = self.snapshot.hours.week(week_id);
        let drafted = stored.overlay(entries);
        let intents = self.hour_intents(week_id, &stored, &drafted, entries);
        if intents.is_empty() {
            return Ok(Decision::Unchanged { status });
        }

        Ok(Decision::Commit(Plan {
            user_id: self.user().id.clone(),
            week_id: week_id.to_string(),
            action: Action::LogHours {
                changed_entries: intents.len(),
            },
            via_override: actor.is_override(),
            intents,
        }))
    }

    pub fn decide_percentage(
        &self,
        acting: &User,
        actor: &Actor,
        week_id: &str,
        percentage: Decimal,
    ) -> Result<Decision, NotFound> {
        if self.catalog.find(week_id).is_none() {
            return Ok(reject(RejectionReason::UnknownWeek {
                week_id: week_id.to_string(),
            }));
        }
        if !self.authorize(acting, actor, Capability::SetPercentage) {
            return Ok(reject(RejectionReason::NotAuthorized));
        }
        if !is_valid_percentage(percentage) {
            return Ok(reject(RejectionReason::InvalidPercentage { percentage }));
        }
        if self.snapshot.percentages.explicit(week_id) == Some(percentage) {
            return Ok(Decision::Unchanged {
                status: self.status(week_id),
            });
        }

        Ok(Decision::Commit(Plan {
            user_id: self.user().id.clone(),
            week_id: week_id.to_string(),
            action: Action::SetPercentage { percentage },
            via_override: actor.is_override(),
            intents: vec![MutationIntent::UpsertPercentage {
                user_id: self.user().id.clone(),
                week_id: week_id.to_string(),
                percentage,
            }],
        }))
    }

    // --- Helpers ---

    /// A repeated submit carrying hours. Unchanged only when the draft matches
    /// what is stored; otherwise the week is locked like any hour edit.
    fn resubmitted_draft(
        &self,
        week_id: &str,
        status: WeekStatus,
        actor: &Actor,
        draft: &[HourEntry],
    ) -> Decision {
        if let Some(reason) = invalid_hours(draft) {
            return reject(reason);
        }
        let stored = self.snapshot.hours.week(week_id);
        let drafted = stored.overlay(draft);
        let intents = self.hour_intents(week_id, &stored, &drafted, draft);
        if intents.is_empty() {
            return Decision::Unchanged { status };
        }
        if !actor.is_override() {
            return reject(RejectionReason::WeekLocked { status });
        }
        Decision::Commit(Plan {
            user_id: self.user().id.clone(),
            week_id: week_id.to_string(),
            action: Action::LogHours {
                changed_entries: intents.len(),
            },
            via_override: true,
            intents,
        })
    }

    fn authorize(&self, acting: &User, actor: &Actor, capability: Capability) -> bool {
        if acting.id != actor.acting_user_id() {
            return false;
        }
        let target = self.user();
        match actor {
            Actor::Owner { user_id } => {
                *user_id == target.id
                    && matches!(capability, Capability::Submit | Capability::EditHours)
            }
            Actor::Manager { manager_id } => {
                matches!(acting.role, Role::Manager | Role::Admin)
                    && target.is_managed_by(manager_id)
                    && capability == Capability::Review
            }
            Actor::UserHead { head_id } => {
                target.is_headed_by(head_id)
                    && matches!(
                        capability,
                        Capability::Submit | Capability::Review | Capability::EditHours
                    )
            }
            Actor::Admin { override_rules, .. } => {
                acting.role == Role::Admin
                    && (capability != Capability::Revert || *override_rules)
            }
        }
    }

    fn first_blocker(
        &self,
        week_id: &str,
        kind: ActionKind,
    ) -> Result<Option<RejectionReason>, NotFound> {
        Ok(self
            .earlier_blockers(week_id, kind)?
            .into_iter()
            .next()
            .map(|blocker| RejectionReason::EarlierWeekBlocking {
                week_id: blocker.week_id,
                status: blocker.status,
            }))
    }

    /// One upsert per touched key whose value actually changes.
    fn hour_intents(
        &self,
        week_id: &str,
        stored: &WeekHours,
        drafted: &WeekHours,
        draft: &[HourEntry],
    ) -> Vec<MutationIntent> {
        let touched: BTreeSet<HourKey> = draft.iter().map(HourEntry::key).collect();
        touched
            .into_iter()
            .filter(|key| drafted.get(key) != stored.get(key))
            .map(|key| MutationIntent::UpsertHours {
                user_id: self.user().id.clone(),
                week_id: week_id.to_string(),
                hours: drafted.get(&key),
                client_id: key.client_id,
                media_type_id: key.media_type_id,
            })
            .collect()
    }
}

fn reject(reason: RejectionReason) -> Decision {
    Decision::Rejected(reason)
}

fn invalid_hours(entries: &[HourEntry]) -> Option<RejectionReason> {
    entries
        .iter()
        .find(|entry| entry.hours < Decimal::ZERO)
        .map(|entry| RejectionReason::InvalidHours {
            client_id: entry.client_id.clone(),
            media_type_id: entry.media_type_id.clone(),
            hours: entry.hours,
        })
}
