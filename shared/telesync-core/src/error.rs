//! Error types for Telesync services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The service could not start or its run loop ended with an error
    #[error("Service failed: {0}")]
    Service(String),
}
