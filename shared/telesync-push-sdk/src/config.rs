//! Push transport configuration

use std::time::Duration;

use telesync_core::env_or;

use crate::{PushError, Result};

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket URL of the notifications endpoint
    pub url: String,
    /// Token sent in the authentication handshake
    pub token: String,
    /// Delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Maximum consecutive failed reconnect attempts (0 = infinite)
    pub max_reconnect_attempts: u32,
}

impl PushConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_attempts: 0,
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("PUSH_URL")
            .map_err(|_| PushError::Configuration("PUSH_URL is not set".to_string()))?;
        let token = std::env::var("API_TOKEN")
            .map_err(|_| PushError::Configuration("API_TOKEN is not set".to_string()))?;
        let delay_ms: u64 = env_or("PUSH_RECONNECT_DELAY_MS", 1000)
            .map_err(|e| PushError::Configuration(e.to_string()))?;
        let max_reconnect_attempts: u32 = env_or("PUSH_MAX_RECONNECTS", 0)
            .map_err(|e| PushError::Configuration(e.to_string()))?;

        Ok(Self {
            url,
            token,
            reconnect_delay: Duration::from_millis(delay_ms),
            max_reconnect_attempts,
        })
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}
