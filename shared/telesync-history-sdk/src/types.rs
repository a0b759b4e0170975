//! Wire types of the historical REST API

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use telesync_core::{MetricId, SeriesPoint, Timestamp};

/// Aggregation applied per resample bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
}

/// Resample bucket width in minutes, rendered as `"<n>T"` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AggregatePeriod {
    minutes: u64,
}

impl AggregatePeriod {
    /// A zero period is not meaningful; it is clamped to one minute.
    pub fn minutes(minutes: u64) -> Self {
        Self {
            minutes: minutes.max(1),
        }
    }

    pub fn as_minutes(&self) -> u64 {
        self.minutes
    }
}

impl fmt::Display for AggregatePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T", self.minutes)
    }
}

impl Serialize for AggregatePeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Body of `POST data/stats/resample/`
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRequest {
    pub variables: Vec<MetricId>,
    pub aggregation: Aggregation,
    pub period: AggregatePeriod,
    pub join_dataframes: bool,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl AggregateRequest {
    /// Mean-aggregated, unjoined request for a single metric
    pub fn mean_of(metric: MetricId, period: AggregatePeriod, start: Timestamp, end: Timestamp) -> Self {
        Self {
            variables: vec![metric],
            aggregation: Aggregation::Mean,
            period,
            join_dataframes: false,
            start,
            end,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValuesResponse {
    pub results: Vec<SeriesPoint>,
}

/// Resample rows are `[timestamp, value]` pairs; empty buckets come back as null.
#[derive(Debug, Deserialize)]
pub(crate) struct ResampleResponse {
    pub results: Vec<Vec<(Timestamp, Option<f64>)>>,
}

impl ResampleResponse {
    pub(crate) fn into_series(self) -> Vec<Vec<SeriesPoint>> {
        self.results
            .into_iter()
            .map(|rows| {
                rows.into_iter()
                    .filter_map(|(timestamp, value)| value.map(|v| SeriesPoint::new(timestamp, v)))
                    .collect()
            })
            .collect()
    }
}
