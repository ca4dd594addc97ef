use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use vitalis_core::ack::Acknowledgment;
use vitalis_core::metrics::{MetricsExplanations, MetricsSnapshot};
use vitalis_core::plan::PlanTargets;

use crate::cache::PlanFetch;

/// Every request carries an explicit timeout; expiry surfaces as
/// [`ClientError::Timeout`], never a silent hang.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {REQUEST_TIMEOUT_SECS}s")]
    Timeout,
    #[error("network error: {0}")]
    Network(reqwest::Error),
    /// Structured non-2xx response from the API.
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// CLI exit code: 1=client error (4xx), 2=server error (5xx), 3=connection error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::Api { status, .. } if *status < 500 => 1,
            ClientError::Api { .. } => 2,
            ClientError::Decode(_) => 2,
            ClientError::Timeout | ClientError::Network(_) => 3,
        }
    }
}

/// `GET /v1/metrics/today` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TodayMetricsView {
    pub metrics: MetricsSnapshot,
    pub explanations: MetricsExplanations,
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledgement: Option<Acknowledgment>,
}

#[derive(Debug, Deserialize)]
struct PlanResponseView {
    targets: PlanTargets,
}

/// Thin typed client over the Vitalis API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    user_id: Uuid,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, user_id: Uuid) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            user_id,
        })
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ClientError> {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-user-id", self.user_id.to_string());
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await.map_err(|err| {
            if err.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::Network(err)
            }
        })?;

        let status = resp.status().as_u16();
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;

        if (200..300).contains(&status) {
            return Ok(value);
        }

        Err(ClientError::Api {
            status,
            code: value
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("request failed")
                .to_string(),
        })
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.send(reqwest::Method::GET, "/health", None).await
    }

    pub async fn today_metrics(&self) -> Result<TodayMetricsView, ClientError> {
        let value = self
            .send(reqwest::Method::GET, "/v1/metrics/today", None)
            .await?;
        serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))
    }

    pub async fn acknowledge(
        &self,
        formula_version: i32,
        metrics_computed_at: DateTime<Utc>,
    ) -> Result<Acknowledgment, ClientError> {
        let value = self
            .send(
                reqwest::Method::POST,
                "/v1/metrics/acknowledge",
                Some(json!({
                    "formula_version": formula_version,
                    "metrics_computed_at": metrics_computed_at,
                })),
            )
            .await?;
        serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))
    }

    pub async fn generate_plan(&self, force_recompute: bool) -> Result<PlanTargets, ClientError> {
        let value = self
            .send(
                reqwest::Method::POST,
                "/v1/plan/generate",
                Some(json!({ "force_recompute": force_recompute })),
            )
            .await?;
        let view: PlanResponseView =
            serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))?;
        Ok(view.targets)
    }
}

impl PlanFetch for ApiClient {
    async fn fetch_plan(&self, force_recompute: bool) -> Result<PlanTargets, ClientError> {
        self.generate_plan(force_recompute).await
    }
}
