// src/lib.rs
pub mod approval_engine;
pub mod config;
pub mod errors;
pub mod hours_ledger;
pub mod http_api;
pub mod memory_store;
pub mod model;
pub mod percentage_ledger;
pub mod rest_store;
pub mod service;
pub mod snapshot_cache;
pub mod status_ledger;
pub mod store;
pub mod week_catalog;


pub use approval_engine::{
    Action, ActionKind, Actor, ApprovalEngine, Blocker, Decision, Plan, TransitionRequest,
    UserSnapshot, WeekSummary,
};
pub use errors::{CatalogError, NotFound, PersistenceError, RejectionReason, TimesheetError};
pub use memory_store::InMemoryStore;
pub use model::{HourEntry, HourKey, Role, User, Week};
pub use rest_store::{RestStore, RestStoreConfig};
pub use service::{AuditRecord, Outcome, TimesheetService, WeekDetail};
pub use status_ledger::{TransitionKind, WeekStatus};
pub use store::{MutationIntent, TimesheetStore};
