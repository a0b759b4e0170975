//! Configuration for the live chart service

use std::path::PathBuf;

use telesync_core::ServiceConfig;
use telesync_history_sdk::HistoryConfig;
use telesync_push_sdk::PushConfig;
use telesync_sync::SyncConfig;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    /// JSON metric catalog
    pub catalog_path: PathBuf,
    pub sync: SyncConfig,
    pub history: HistoryConfig,
    pub push: PushConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            service: ServiceConfig::from_env()?,
            catalog_path: std::env::var("CATALOG_PATH")
                .unwrap_or_else(|_| "catalog.json".to_string())
                .into(),
            sync: SyncConfig::from_env()?,
            history: HistoryConfig::from_env().map_err(|e| Error::Config(e.to_string()))?,
            push: PushConfig::from_env().map_err(|e| Error::Config(e.to_string()))?,
        })
    }
}
