//! Configuration management for services

use crate::error::{CoreError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_bind: String,
    /// Time a service gets to stop after a shutdown signal
    pub shutdown_grace: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let grace_secs: u64 = env_or("SHUTDOWN_GRACE_SECS", 10)?;
        Ok(Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "telesync".to_string()),
            http_bind: env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            shutdown_grace: Duration::from_secs(grace_secs),
        })
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
///
/// A value that is present but does not parse is a configuration error
/// rather than a silent fallback.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
