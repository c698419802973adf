//! Ledger transport
//!
//! The tracker talks to the ledger through the [`Transport`] trait so
//! tests can substitute a mock. [`HttpTransport`] is the production
//! implementation over reqwest.

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use pulse_core::{RuntimeMetrics, WorkSession};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of the session start call.
#[derive(Debug, Clone, Serialize)]
pub struct StartSessionBody {
    /// Worker opening the session
    pub worker_id: Uuid,
    /// Task identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Task description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    /// Model version the tracker is configured with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// Responses wrap the session row.
#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: WorkSession,
}

/// Network seam between the tracker and the ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST /api/sessions/start`
    async fn start_session(&self, body: &StartSessionBody) -> Result<WorkSession>;

    /// `POST /api/sessions/{id}/heartbeat`
    async fn heartbeat(&self, session_id: Uuid, metrics: &RuntimeMetrics) -> Result<WorkSession>;

    /// `POST /api/sessions/{id}/end`
    async fn end_session(&self, session_id: Uuid, metrics: &RuntimeMetrics)
        -> Result<WorkSession>;
}

/// HTTP transport over reqwest with bearer authentication.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl HttpTransport {
    /// Build a transport from the tracker configuration.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout.as_millis() as u64,
        })
    }

    async fn post_session(&self, path: &str, body: serde_json::Value) -> Result<WorkSession> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout_ms)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: SessionEnvelope = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(envelope.session)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start_session(&self, body: &StartSessionBody) -> Result<WorkSession> {
        let body = serde_json::to_value(body)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        self.post_session("/api/sessions/start", body).await
    }

    async fn heartbeat(&self, session_id: Uuid, metrics: &RuntimeMetrics) -> Result<WorkSession> {
        let body = serde_json::to_value(metrics)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        self.post_session(&format!("/api/sessions/{}/heartbeat", session_id), body)
            .await
    }

    async fn end_session(
        &self,
        session_id: Uuid,
        metrics: &RuntimeMetrics,
    ) -> Result<WorkSession> {
        let body = serde_json::to_value(metrics)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        self.post_session(&format!("/api/sessions/{}/end", session_id), body)
            .await
    }
}
