//! Error types for the sync engine

use telesync_core::{CoreError, MetricId, Timestamp};
use telesync_history_sdk::HistoryError;
use telesync_push_sdk::PushError;

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid range: start {start} is not before end {end}")]
    InvalidRange { start: Timestamp, end: Timestamp },

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Fetch failed for {metric}: {source}")]
    FetchFailure {
        metric: MetricId,
        #[source]
        source: HistoryError,
    },

    #[error("Cannot decode point for {metric}: {reason}")]
    DecodeFailure { metric: MetricId, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] PushError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn fetch(metric: &MetricId, source: HistoryError) -> Self {
        SyncError::FetchFailure {
            metric: metric.clone(),
            source,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::InvalidCatalog(_) => "INVALID_CATALOG",
            Self::FetchFailure { .. } => "FETCH_FAILURE",
            Self::DecodeFailure { .. } => "DECODE_FAILURE",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(msg) => SyncError::Config(msg),
            other => SyncError::Config(other.to_string()),
        }
    }
}
