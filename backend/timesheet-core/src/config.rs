// src/config.rs
use serde::Deserialize;

use crate::errors::PersistenceError;
use crate::rest_store::{RestStoreConfig, DEFAULT_TIMEOUT_SECS};
use crate::service::DEFAULT_AUDIT_CAPACITY;

pub const ENV_PREFIX: &str = "TIMESHEET_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Rest,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub store: StoreKind,

    // REST backend
    pub rest_base_url: Option<String>,
    pub rest_api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seed the in-memory store with the demo weeks and team.
    #[serde(default)]
    pub seed_demo: bool,

    /// Audit records kept in memory; older ones are dropped.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_audit_capacity() -> usize {
    DEFAULT_AUDIT_CAPACITY
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX).from_env::<Config>()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }

    pub fn rest_store_config(&self) -> Result<RestStoreConfig, PersistenceError> {
        let base_url = self.rest_base_url.clone().ok_or_else(|| {
            PersistenceError::ConfigError(format!(
                "{}REST_BASE_URL must be set for the rest store",
                ENV_PREFIX
            ))
        })?;
        Ok(RestStoreConfig {
            base_url,
            api_key: self.rest_api_key.clone(),
            timeout_secs: self.request_timeout_secs,
        })
    }
}
