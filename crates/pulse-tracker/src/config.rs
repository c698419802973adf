//! Tracker configuration

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Default model name when none is configured
pub const DEFAULT_MODEL: &str = "unknown";

/// Default interval between background metric flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default HTTP request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tracker configuration
#[derive(Clone)]
pub struct TrackerConfig {
    /// Worker this tracker reports for
    pub worker_id: Uuid,
    /// API credential, sent as a bearer token
    pub api_key: String,
    /// Ledger base URL
    pub base_url: String,
    /// Model name used for cost calculation and session metadata
    pub model_name: String,
    /// Interval between background metric flushes
    pub flush_interval: Duration,
    /// HTTP request timeout
    pub timeout: Duration,
}

// Custom Debug implementation to mask the API key
impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("worker_id", &self.worker_id)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("flush_interval", &self.flush_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Mask an API key for safe display
fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

impl TrackerConfig {
    /// Create a configuration with the required fields.
    #[must_use]
    pub fn new(worker_id: Uuid, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            worker_id,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create configuration from environment variables
    /// (`PULSE_WORKER_ID`, `PULSE_API_KEY`, `PULSE_API_URL`, `PULSE_MODEL`).
    pub fn from_env() -> Result<Self> {
        let worker_id = std::env::var("PULSE_WORKER_ID")
            .map_err(|_| Error::NotConfigured("PULSE_WORKER_ID not set".to_string()))?;
        let worker_id = Uuid::parse_str(&worker_id)
            .map_err(|_| Error::NotConfigured("PULSE_WORKER_ID is not a valid UUID".to_string()))?;
        let api_key = std::env::var("PULSE_API_KEY")
            .map_err(|_| Error::NotConfigured("PULSE_API_KEY not set".to_string()))?;
        let base_url = std::env::var("PULSE_API_URL")
            .map_err(|_| Error::NotConfigured("PULSE_API_URL not set".to_string()))?;

        let mut config = Self::new(worker_id, api_key, base_url);
        if let Ok(model) = std::env::var("PULSE_MODEL") {
            config.model_name = model;
        }
        Ok(config)
    }

    /// Set the model name
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    /// Set the flush interval
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the HTTP request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
