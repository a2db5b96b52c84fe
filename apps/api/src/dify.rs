//! Client for the Dify workflow API.
//!
//! Workflow runs and stops are sent exactly once; read-only GETs are retried and
//! `logs`/`parameters` go through the fetch cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::config::DifyConfig;
use crate::fetch::{with_auth, CachedFetcher, FetchError, DEFAULT_TTL};

#[derive(Debug, Error)]
pub enum DifyError {
    #[error("Dify is not configured (DIFY_API_KEY is missing)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl From<FetchError> for DifyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Http(e) => DifyError::Http(e),
            FetchError::Status { status, body } => DifyError::Api {
                status,
                message: upstream_message(&body),
            },
        }
    }
}

/// Dify error bodies look like `{"code": "...", "message": "..."}`.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRunData {
    pub id: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
}

impl WorkflowRunData {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRunResponse {
    pub workflow_run_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub data: WorkflowRunData,
}

#[derive(Clone)]
pub struct DifyClient {
    fetcher: Arc<CachedFetcher>,
    config: DifyConfig,
}

impl DifyClient {
    pub fn new(config: DifyConfig) -> Result<Self, DifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            fetcher: Arc::new(CachedFetcher::new(client, DEFAULT_TTL)),
            config,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, DifyError> {
        self.config.api_key.as_deref().ok_or(DifyError::NotConfigured)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// POST /workflows/run in blocking mode.
    pub async fn run_workflow(
        &self,
        inputs: Value,
        user: Option<&str>,
    ) -> Result<WorkflowRunResponse, DifyError> {
        let key = self.api_key()?;
        let url = self.url("workflows/run");
        let body = json!({
            "inputs": inputs,
            "response_mode": "blocking",
            "user": user.unwrap_or(&self.config.user_id),
        });
        let value = self
            .fetcher
            .send_once(with_auth(self.fetcher.client().post(&url), Some(key)).json(&body))
            .await?;
        let response: WorkflowRunResponse = serde_json::from_value(value)?;
        info!(
            workflow_run_id = %response.workflow_run_id,
            status = %response.data.status,
            "Dify workflow finished"
        );
        Ok(response)
    }

    /// POST /workflows/tasks/:task_id/stop
    pub async fn stop_task(&self, task_id: &str, user: Option<&str>) -> Result<Value, DifyError> {
        let key = self.api_key()?;
        let url = self.url(&format!("workflows/tasks/{task_id}/stop"));
        let body = json!({ "user": user.unwrap_or(&self.config.user_id) });
        Ok(self
            .fetcher
            .send_once(with_auth(self.fetcher.client().post(&url), Some(key)).json(&body))
            .await?)
    }

    /// GET /workflows/run/:run_id
    pub async fn run_status(&self, run_id: &str) -> Result<Value, DifyError> {
        let key = self.api_key()?;
        let url = self.url(&format!("workflows/run/{run_id}"));
        Ok(self
            .fetcher
            .send_json(|| with_auth(self.fetcher.client().get(&url), Some(key)))
            .await?)
    }

    /// GET /workflows/logs, cached per query string.
    pub async fn logs(&self, query: &BTreeMap<String, String>) -> Result<Value, DifyError> {
        let key = self.api_key()?;
        let url = self.logs_url(query)?;
        Ok(self.fetcher.get_json(url.as_str(), Some(key)).await?)
    }

    fn logs_url(&self, query: &BTreeMap<String, String>) -> Result<Url, DifyError> {
        let base = self.url("workflows/logs");
        let parsed = if query.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, query)
        };
        parsed.map_err(|e| DifyError::InvalidUrl(format!("{base}: {e}")))
    }

    /// GET /parameters, cached.
    pub async fn parameters(&self) -> Result<Value, DifyError> {
        let key = self.api_key()?;
        let url = self.url("parameters");
        Ok(self.fetcher.get_json(&url, Some(key)).await?)
    }
}
