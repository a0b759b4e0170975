//! Historical telemetry SDK for Telesync
//!
//! Provides the `HistoricalSource` abstraction used by the sync engine for
//! backfills, and a REST implementation against the telemetry platform's
//! count / values / resample endpoints.

mod client;
mod config;
mod error;
mod source;
mod types;

pub use client::RestHistoricalSource;
pub use config::HistoryConfig;
pub use error::{HistoryError, Result};
pub use source::HistoricalSource;
pub use types::*;

/// Re-export for convenience
pub mod prelude {
    pub use super::types::*;
    pub use super::{HistoricalSource, HistoryError, RestHistoricalSource, Result};
}
