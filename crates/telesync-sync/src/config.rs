//! Engine configuration

use std::time::Duration;

use telesync_core::env_or;

use crate::{Result, SyncError};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Span of the live window used at startup and after a reconnect
    pub default_span: Duration,
    /// Raw-vs-aggregate threshold; also the retained size of aggregated traces
    pub max_chart_points: usize,
    /// How often the ordered writer re-checks a blocked queue
    pub writer_retry_delay: Duration,
    /// Stalled checks tolerated before the missing trace is released empty
    pub writer_max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_span: Duration::from_secs(5 * 60),
            max_chart_points: 100,
            writer_retry_delay: Duration::from_millis(20),
            writer_max_retries: 1500,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let span_minutes: u64 = env_or("DEFAULT_SPAN_MINUTES", 5)?;
        let max_chart_points: usize = env_or("MAX_CHART_POINTS", 100)?;
        let retry_delay_ms: u64 = env_or("WRITER_RETRY_DELAY_MS", 20)?;
        let writer_max_retries: u32 = env_or("WRITER_MAX_RETRIES", 1500)?;

        let span_secs = span_minutes
            .checked_mul(60)
            .ok_or_else(|| SyncError::Config("DEFAULT_SPAN_MINUTES is too large".into()))?;

        let config = Self {
            default_span: Duration::from_secs(span_secs),
            max_chart_points,
            writer_retry_delay: Duration::from_millis(retry_delay_ms),
            writer_max_retries,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_span.is_zero() {
            return Err(SyncError::Config("DEFAULT_SPAN_MINUTES must be positive".into()));
        }
        if i64::try_from(self.default_span.as_millis()).is_err() {
            return Err(SyncError::Config("DEFAULT_SPAN_MINUTES is too large".into()));
        }
        if self.max_chart_points == 0 {
            return Err(SyncError::Config("MAX_CHART_POINTS must be positive".into()));
        }
        if self.writer_retry_delay.is_zero() {
            return Err(SyncError::Config("WRITER_RETRY_DELAY_MS must be positive".into()));
        }
        // zero would release every still-fetching trace on the first check
        if self.writer_max_retries == 0 {
            return Err(SyncError::Config("WRITER_MAX_RETRIES must be positive".into()));
        }
        Ok(())
    }

    /// Default span in epoch milliseconds, saturating for spans `validate` rejects
    pub fn default_span_millis(&self) -> i64 {
        i64::try_from(self.default_span.as_millis()).unwrap_or(i64::MAX)
    }
}
