//! Historical SDK configuration

use std::time::Duration;

use telesync_core::env_or;

use crate::{HistoryError, Result};

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Base URL of the REST API, e.g. `https://industrial.api.ubidots.com/api/v1.6`
    pub base_url: String,
    /// Value for the `X-Auth-Token` header
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HistoryConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("HISTORY_API_URL")
            .unwrap_or_else(|_| "https://industrial.api.ubidots.com/api/v1.6".to_string());
        let token = std::env::var("API_TOKEN")
            .map_err(|_| HistoryError::Configuration("API_TOKEN is not set".to_string()))?;
        let timeout_secs: u64 = env_or("HISTORY_TIMEOUT_SECS", 10)
            .map_err(|e| HistoryError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url,
            token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
