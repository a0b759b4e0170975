//! Error types for the live chart service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use telesync_core::CoreError;
use telesync_history_sdk::HistoryError;
use telesync_sync::SyncError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Historical source error: {0}")]
    History(#[from] HistoryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<Error> for CoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(inner) => inner,
            Error::Config(msg) => CoreError::Config(msg),
            Error::Sync(SyncError::Config(msg)) => CoreError::Config(msg),
            other => CoreError::Service(other.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", self.to_string()),
            Error::Sync(e @ SyncError::InvalidRange { .. }) => {
                (StatusCode::BAD_REQUEST, e.error_code(), self.to_string())
            }
            Error::Sync(SyncError::Transport(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "TRANSPORT_ERROR",
                self.to_string(),
            ),
            _ => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
