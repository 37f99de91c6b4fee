// src/http_api.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::approval_engine::{ActionKind, Actor, TransitionRequest};
use crate::errors::{PersistenceError, TimesheetError};
use crate::model::HourEntry;
use crate::service::{Outcome, TimesheetService};
use crate::status_ledger::TransitionKind;

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Timesheet(#[from] TimesheetError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Error occurred: {}", self);

        let AppError::Timesheet(err) = self;
        let (status_code, message) = match &err {
            TimesheetError::NotFound(e) => (StatusCode::NOT_FOUND, e.to_string()),
            TimesheetError::Catalog(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Week catalog is inconsistent: {}", e),
            ),
            TimesheetError::Persistence(PersistenceError::ConfigError(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Configuration error: {}", msg),
            ),
            TimesheetError::Persistence(_) => (
                StatusCode::BAD_GATEWAY,
                "Store request failed. Details logged.".to_string(),
            ),
        };

        (status_code, Json(ErrorBody { error: message })).into_response()
    }
}

// --- Request bodies ---

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub kind: TransitionKind,
    pub actor: Actor,
    #[serde(default)]
    pub draft: Vec<HourEntry>,
}

#[derive(Debug, Deserialize)]
pub struct HoursBody {
    pub actor: Actor,
    pub entries: Vec<HourEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PercentageBody {
    pub actor: Actor,
    pub percentage: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct FirstActionableQuery {
    pub kind: ActionKind,
}

// --- Router ---

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TimesheetService>,
}

pub fn router(service: Arc<TimesheetService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/weeks", get(list_weeks))
        .route("/audit", get(audit_log))
        .route("/users/{user_id}/overview", get(user_overview))
        .route("/users/{user_id}/submitted", get(submitted_weeks))
        .route("/users/{user_id}/first-actionable", get(first_actionable))
        .route("/users/{user_id}/weeks/{week_id}", get(week_detail))
        .route("/users/{user_id}/weeks/{week_id}/hours", put(log_hours))
        .route(
            "/users/{user_id}/weeks/{week_id}/percentage",
            put(set_percentage),
        )
        .route(
            "/users/{user_id}/weeks/{week_id}/transitions",
            post(transition),
        )
        .with_state(AppState { service })
}

/// Rejections are expected outcomes, so they travel as 409 with the reason.
fn outcome_response(outcome: Outcome) -> Response {
    let status = match outcome {
        Outcome::Rejected(_) => StatusCode::CONFLICT,
        Outcome::Applied(_) | Outcome::Unchanged { .. } => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

// --- Handlers ---

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_weeks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.weeks().await?))
}

async fn audit_log(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.audit_log().await)
}

async fn user_overview(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.overview(&user_id).await?))
}

async fn submitted_weeks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.submitted_weeks(&user_id).await?))
}

async fn first_actionable(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FirstActionableQuery>,
) -> Result<impl IntoResponse, AppError> {
    let week = state
        .service
        .first_actionable_week(&user_id, query.kind)
        .await?;
    Ok(Json(serde_json::json!({ "kind": query.kind, "week": week })))
}

async fn week_detail(
    State(state): State<AppState>,
    Path((user_id, week_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.week_detail(&user_id, &week_id).await?))
}

async fn log_hours(
    State(state): State<AppState>,
    Path((user_id, week_id)): Path<(String, String)>,
    Json(body): Json<HoursBody>,
) -> Result<Response, AppError> {
    let outcome = state
        .service
        .log_hours(&user_id, &week_id, body.actor, body.entries)
        .await?;
    Ok(outcome_response(outcome))
}

async fn set_percentage(
    State(state): State<AppState>,
    Path((user_id, week_id)): Path<(String, String)>,
    Json(body): Json<PercentageBody>,
) -> Result<Response, AppError> {
    let outcome = state
        .service
        .set_percentage(&user_id, &week_id, body.actor, body.percentage)
        .await?;
    Ok(outcome_response(outcome))
}

async fn transition(
    State(state): State<AppState>,
    Path((user_id, week_id)): Path<(String, String)>,
    Json(body): Json<TransitionBody>,
) -> Result<Response, AppError> {
    let request = TransitionRequest {
        week_id,
        kind: body.kind,
        actor: body.actor,
        draft: body.draft,
    };
    let outcome = state.service.transition(&user_id, request).await?;
    Ok(outcome_response(outcome))
}
