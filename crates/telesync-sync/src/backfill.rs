//! Historical backfill
//!
//! For one metric and window the fetcher counts the stored points and picks a
//! strategy: nothing, the raw points, or a mean-aggregated series with at
//! most `threshold` buckets.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use telesync_core::{MetricId, SeriesPoint};
use telesync_history_sdk::{AggregatePeriod, AggregateRequest, HistoricalSource};

use crate::metrics::SyncMetrics;
use crate::range::Window;
use crate::{Result, SyncError};

/// Retrieval strategy chosen from the point count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    Empty,
    Raw { page_size: u64 },
    Aggregate { period: AggregatePeriod },
}

impl FetchPlan {
    /// Points retained for the trace under this plan
    pub fn max_retained(&self, threshold: usize) -> usize {
        match self {
            FetchPlan::Raw { page_size } => *page_size as usize,
            FetchPlan::Empty | FetchPlan::Aggregate { .. } => threshold,
        }
    }
}

/// Decide how to retrieve `count` points given the chart threshold
pub fn plan(count: u64, threshold: usize) -> FetchPlan {
    let threshold = threshold.max(1) as u64;
    if count == 0 {
        FetchPlan::Empty
    } else if count <= threshold {
        FetchPlan::Raw { page_size: count }
    } else {
        FetchPlan::Aggregate {
            period: AggregatePeriod::minutes(count.div_ceil(threshold)),
        }
    }
}

/// What a backfill produced for one series
#[derive(Debug, Clone, PartialEq)]
pub enum BackfillOutcome {
    /// Ascending points; empty when the window holds no data
    Series {
        points: Vec<SeriesPoint>,
        max_retained: usize,
    },
    Failed { reason: String },
}

impl BackfillOutcome {
    pub fn empty(max_retained: usize) -> Self {
        BackfillOutcome::Series {
            points: Vec::new(),
            max_retained,
        }
    }
}

pub struct BackfillFetcher {
    source: Arc<dyn HistoricalSource>,
    threshold: usize,
    metrics: SyncMetrics,
}

impl BackfillFetcher {
    pub fn new(source: Arc<dyn HistoricalSource>, threshold: usize, metrics: SyncMetrics) -> Self {
        Self {
            source,
            threshold: threshold.max(1),
            metrics,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Fetch the historical series of `metric` over `window`.
    ///
    /// Errors are [`SyncError::FetchFailure`]; the caller decides how the
    /// failed metric is represented on the chart.
    #[instrument(skip(self, metric, window), fields(metric = %metric))]
    pub async fn fetch(&self, metric: &MetricId, window: &Window) -> Result<BackfillOutcome> {
        let started = Instant::now();
        let result = self.fetch_inner(metric, window).await;
        self.metrics
            .fetch_latency_ms
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if result.is_err() {
            self.metrics.backfill_failed.inc();
        }
        result
    }

    async fn fetch_inner(&self, metric: &MetricId, window: &Window) -> Result<BackfillOutcome> {
        let count = self
            .source
            .count(metric, window.start, window.end)
            .await
            .map_err(|e| SyncError::fetch(metric, e))?;

        let plan = plan(count, self.threshold);
        let max_retained = plan.max_retained(self.threshold);
        debug!(count, ?plan, max_retained, "Backfill planned");

        let newest_first = match plan {
            FetchPlan::Empty => {
                self.metrics.backfill_empty.inc();
                return Ok(BackfillOutcome::empty(max_retained));
            }
            FetchPlan::Raw { page_size } => {
                let points = self
                    .source
                    .raw_points(metric, window.start, window.end, page_size)
                    .await
                    .map_err(|e| SyncError::fetch(metric, e))?;
                self.metrics.backfill_raw.inc();
                points
            }
            FetchPlan::Aggregate { period } => {
                let request =
                    AggregateRequest::mean_of(metric.clone(), period, window.start, window.end);
                let series = self
                    .source
                    .aggregate(&request)
                    .await
                    .map_err(|e| SyncError::fetch(metric, e))?;
                self.metrics.backfill_aggregate.inc();
                series.into_iter().next().unwrap_or_default()
            }
        };

        Ok(BackfillOutcome::Series {
            points: ascending(newest_first),
            max_retained,
        })
    }
}

/// Reverse a newest-first series; falls back to a stable sort if the source
/// did not deliver it strictly in that order.
fn ascending(mut points: Vec<SeriesPoint>) -> Vec<SeriesPoint> {
    points.reverse();
    if !points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        debug!(
            points = points.len(),
            "Source series was not newest-first, sorting by timestamp"
        );
        points.sort_by_key(|p| p.timestamp);
    }
    points
}
