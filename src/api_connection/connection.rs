use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use super::endpoints::{
    recalculate_macros_url, weekly_plan_url, RecalculateMacrosRequest, RecalculateMacrosResponse,
    SaveWeeklyPlanRequest, WeeklyPlanEnvelope,
};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    /// The request could not be sent or the response could not be read.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {message}")]
    Http { status: StatusCode, message: String },

    /// The body was not JSON or lacked expected fields.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Decode a response body, reporting malformed JSON or missing fields as
/// `ApiConnectionError::Parse`.
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiConnectionError> {
    serde_json::from_str(body).map_err(|e| ApiConnectionError::Parse(e.to_string()))
}

/// The three backend calls the plan editor depends on.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    async fn fetch_weekly_plan(&self, user_id: &str)
        -> Result<WeeklyPlanEnvelope, ApiConnectionError>;

    async fn recalculate_macros(
        &self,
        request: &RecalculateMacrosRequest,
    ) -> Result<RecalculateMacrosResponse, ApiConnectionError>;

    async fn save_weekly_plan(
        &self,
        user_id: &str,
        request: &SaveWeeklyPlanRequest,
    ) -> Result<(), ApiConnectionError>;
}

/// `PlanBackend` over JSON/HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiConnectionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiConnectionError> {
        let response = Self::check_status(response).await?;
        let body = response.text().await?;
        parse_body(&body)
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiConnectionError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        Err(ApiConnectionError::Http {
            status,
            message: server_message(&message),
        })
    }
}

/// Backends answer errors as `{"detail": "..."}`; fall back to the raw body.
fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl PlanBackend for HttpBackend {
    async fn fetch_weekly_plan(
        &self,
        user_id: &str,
    ) -> Result<WeeklyPlanEnvelope, ApiConnectionError> {
        let url = weekly_plan_url(&self.base_url, user_id);
        tracing::debug!(%url, "fetching weekly plan");
        let response = self.client.get(&url).send().await?;
        Self::read_json(response).await
    }

    async fn recalculate_macros(
        &self,
        request: &RecalculateMacrosRequest,
    ) -> Result<RecalculateMacrosResponse, ApiConnectionError> {
        let url = recalculate_macros_url(&self.base_url);
        tracing::debug!(%url, recipe_id = request.ricetta_id, "recalculating macros");
        let response = self.client.post(&url).json(request).send().await?;
        Self::read_json(response).await
    }

    async fn save_weekly_plan(
        &self,
        user_id: &str,
        request: &SaveWeeklyPlanRequest,
    ) -> Result<(), ApiConnectionError> {
        let url = weekly_plan_url(&self.base_url, user_id);
        tracing::debug!(%url, days = request.piano_settimanale.len(), "saving weekly plan");
        let response = self.client.put(&url).json(request).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
