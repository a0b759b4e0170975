//! Historical data source abstraction

use async_trait::async_trait;
use telesync_core::{MetricId, SeriesPoint, Timestamp};

use crate::{AggregateRequest, Result};

/// Read side of the telemetry platform used for backfills.
///
/// Both retrieval methods return points newest-first, the order the platform
/// delivers them in. Callers are responsible for reversing before storage.
#[async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Number of stored points for `metric` in `[start, end]`
    async fn count(&self, metric: &MetricId, start: Timestamp, end: Timestamp) -> Result<u64>;

    /// Raw points for `metric` in `[start, end]`, at most `page_size` of them
    async fn raw_points(
        &self,
        metric: &MetricId,
        start: Timestamp,
        end: Timestamp,
        page_size: u64,
    ) -> Result<Vec<SeriesPoint>>;

    /// Period-bucketed aggregate, one series per requested metric
    async fn aggregate(&self, request: &AggregateRequest) -> Result<Vec<Vec<SeriesPoint>>>;
}
