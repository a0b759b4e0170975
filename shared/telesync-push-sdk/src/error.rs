//! Error types for the push SDK

/// Result type alias
pub type Result<T> = std::result::Result<T, PushError>;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected to push server")]
    NotConnected,

    #[error("Transport closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for PushError {
    fn from(err: serde_json::Error) -> Self {
        PushError::Protocol(err.to_string())
    }
}
