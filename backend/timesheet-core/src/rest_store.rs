// src/rest_store.rs

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::PersistenceError;
use crate::model::{HourKey, User, Week, WeekId};
use crate::status_ledger::WeekStatus;
use crate::store::{MutationIntent, TimesheetStore};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const COMMIT_RPC: &str = "rpc/commit_timesheet_batch";

// --- Row types as the backend returns them ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRow {
    week_id: WeekId,
    status: WeekStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PercentageRow {
    week_id: WeekId,
    percentage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HourRow {
    client_id: String,
    media_type_id: String,
    hours: Decimal,
}

#[derive(Debug, Serialize)]
struct CommitBody<'a> {
    batch: &'a [MutationIntent],
}

#[derive(Debug, Deserialize)]
struct BackendErrorPayload {
    message: Option<String>,
}

// --- Client ---

#[derive(Clone, Debug)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Store backed by a PostgREST-style HTTP API. Each table is a resource and
/// batches are committed through one RPC so the backend can run them in a
/// single transaction.
#[derive(Clone)]
pub struct RestStore {
    base_url: Url,
    api_key: Option<String>,
    http_client: Client,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, PersistenceError> {
        if config.base_url.trim().is_empty() {
            return Err(PersistenceError::ConfigError(
                "REST store requires a base URL".to_string(),
            ));
        }
        // A trailing slash keeps the last path segment when joining
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            api_key: config.api_key,
            http_client,
        })
    }

    pub fn endpoint_url(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Url, PersistenceError> {
        let mut url = self.base_url.join(endpoint.trim_start_matches('/'))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<RequestBuilder, PersistenceError> {
        let url = self.endpoint_url(endpoint, query)?;
        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header(AUTHORIZATION, format!("Bearer {}", key));
        }
        Ok(request)
    }

    /// Sends the request and returns the raw body of a success response.
    async fn send(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<String, PersistenceError> {
        let request = match request_builder.build() {
            Ok(req) => req,
            Err(e) => {
                error!("Request build failed for '{}': {}", context_msg, e);
                return Err(PersistenceError::Request(e));
            }
        };
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = match self.http_client.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    "HTTP execution failed before receiving response for '{}' (URL: {}): {}",
                    context_msg, request_url, e
                );
                return Err(PersistenceError::Request(e));
            }
        };

        let status = resp.status();
        info!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            let text = resp.text().await?;
            debug!("Raw Success Response Body for '{}': {}", context_msg, text);
            return Ok(text);
        }

        let error_body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
        error!(
            "API Error Response: Status={}, Body='{}' for URL: {}",
            status, error_body, request_url
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limit exceeded for '{}' (URL: {})", context_msg, request_url);
            return Err(PersistenceError::RateLimitExceeded);
        }
        Err(PersistenceError::ApiError {
            status: status.as_u16(),
            message: api_error_message(&error_body),
        })
    }

    pub async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, PersistenceError> {
        let body = self.send(request_builder, context_msg).await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            error!("JSON deserialization failed for '{}': {}", context_msg, e);
            PersistenceError::Json(e)
        })
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        context_msg: &str,
    ) -> Result<Vec<T>, PersistenceError> {
        let request = self.build_request(Method::GET, endpoint, query)?;
        self.send_and_deserialize(request, context_msg).await
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<BackendErrorPayload>(body) {
        Ok(BackendErrorPayload {
            message: Some(message),
        }) => message,
        _ => body.to_string(),
    }
}

#[async_trait]
impl TimesheetStore for RestStore {
    async fn load_weeks(&self) -> Result<Vec<Week>, PersistenceError> {
        let query = [("order", "period_from.asc".to_string())];
        self.get_rows("weeks", &query, "load weeks").await
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<User>, PersistenceError> {
        let query = [("id", eq(user_id)), ("limit", "1".to_string())];
        let users: Vec<User> = self.get_rows("users", &query, "load user").await?;
        Ok(users.into_iter().next())
    }

    async fn load_statuses(
        &self,
        user_id: &str,
    ) -> Result<HashMap<WeekId, WeekStatus>, PersistenceError> {
        let query = [
            ("user_id", eq(user_id)),
            ("select", "week_id,status".to_string()),
        ];
        let rows: Vec<StatusRow> = self
            .get_rows("week_statuses", &query, "load statuses")
            .await?;
        Ok(rows.into_iter().map(|r| (r.week_id, r.status)).collect())
    }

    async fn load_percentages(
        &self,
        user_id: &str,
    ) -> Result<HashMap<WeekId, Decimal>, PersistenceError> {
        let query = [
            ("user_id", eq(user_id)),
            ("select", "week_id,percentage".to_string()),
        ];
        let rows: Vec<PercentageRow> = self
            .get_rows("week_percentages", &query, "load percentages")
            .await?;
        Ok(rows.into_iter().map(|r| (r.week_id, r.percentage)).collect())
    }

    async fn load_hours(
        &self,
        user_id: &str,
        week_id: &str,
    ) -> Result<HashMap<HourKey, Decimal>, PersistenceError> {
        let query = [
            ("user_id", eq(user_id)),
            ("week_id", eq(week_id)),
            ("select", "client_id,media_type_id,hours".to_string()),
        ];
        let rows: Vec<HourRow> = self.get_rows("hour_entries", &query, "load hours").await?;
        Ok(hour_map(rows))
    }

    async fn commit(&self, intents: &[MutationIntent]) -> Result<(), PersistenceError> {
        if intents.is_empty() {
            return Ok(());
        }
        let request = self
            .build_request(Method::POST, COMMIT_RPC, &[])?
            .json(&CommitBody { batch: intents });
        self.send(request, "commit batch").await?;
        info!("Committed batch of {} intents", intents.len());
        Ok(())
    }
}

fn hour_map(rows: Vec<HourRow>) -> HashMap<HourKey, Decimal> {
    rows.into_iter()
        .map(|r| (HourKey::new(&r.client_id, &r.media_type_id), r.hours))
        .collect()
}
