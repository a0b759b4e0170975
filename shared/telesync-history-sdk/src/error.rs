//! Error types for the historical SDK

/// Result type alias
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Historical source errors
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for HistoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HistoryError::Timeout(err.to_string())
        } else if err.is_decode() {
            HistoryError::Parse(err.to_string())
        } else {
            HistoryError::Network(err.to_string())
        }
    }
}
