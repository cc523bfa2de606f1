use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::editor::RecomputeOrdering;

pub const BASE_URL_ENV_VAR: &str = "PLAN_API_BASE_URL";
pub const USER_ID_ENV_VAR: &str = "PLAN_USER_ID";
pub const TIMEOUT_ENV_VAR: &str = "PLAN_REQUEST_TIMEOUT_SECS";
pub const ORDERING_ENV_VAR: &str = "PLAN_RECOMPUTE_ORDERING";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub base_url: String,
    pub user_id: String,
    pub request_timeout: Duration,
    pub ordering: RecomputeOrdering,
}

impl EditorConfig {
    /// Read settings from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_overrides(|_| None)
    }

    /// Like [`from_env`](Self::from_env), but `overrides` (e.g. command-line
    /// flags) win over the environment for any setting they return.
    pub fn from_env_with_overrides<F>(overrides: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| overrides(name).or_else(|| env::var(name).ok()))
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_ENV_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let user_id = lookup(USER_ID_ENV_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(USER_ID_ENV_VAR))?;

        let timeout_secs = match lookup(TIMEOUT_ENV_VAR) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: TIMEOUT_ENV_VAR,
                reason: e.to_string(),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let ordering = match lookup(ORDERING_ENV_VAR) {
            Some(raw) => raw
                .parse::<RecomputeOrdering>()
                .map_err(|reason| ConfigError::Invalid {
                    name: ORDERING_ENV_VAR,
                    reason,
                })?,
            None => RecomputeOrdering::default(),
        };

        Ok(Self {
            base_url,
            user_id,
            request_timeout: Duration::from_secs(timeout_secs),
            ordering,
        })
    }
}
