//! Chart and display collaborators
//!
//! The engine never renders anything itself. It drives a [`ChartSink`] for
//! traces and a [`DisplaySink`] for readouts, indicator states and passive
//! notices. In-memory implementations back the HTTP service and the tests.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use telesync_core::{MetricId, SeriesPoint};

use crate::catalog::Axis;

const MAX_NOTICES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub metric: MetricId,
    pub name: String,
    pub axis: Axis,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeKind {
    FetchFailed { metric: MetricId },
    Disconnected,
    TransportError,
}

/// Passive, non-blocking notification for the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    #[serde(flatten)]
    pub kind: NoticeKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Chart collaborator. Trace indices follow insertion order.
pub trait ChartSink: Send + Sync {
    fn init_empty(&self);
    fn add_trace(&self, trace: Trace);
    fn extend_trace(&self, index: usize, point: SeriesPoint, max_retained: usize);
    fn delete_traces(&self, indices: &[usize]);
    fn relayout(&self, dimensions: Dimensions);
}

pub trait DisplaySink: Send + Sync {
    fn set_numeric_readout(&self, metric: &MetricId, value: f64);
    fn set_boolean_state(&self, metric: &MetricId, state: bool);
    fn notify(&self, notice: Notice);
}

/// Chart kept in memory
#[derive(Default)]
pub struct InMemoryChart {
    traces: Mutex<Vec<Trace>>,
    dimensions: Mutex<Option<Dimensions>>,
}

impl InMemoryChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<Trace> {
        self.traces.lock().clone()
    }

    pub fn trace_names(&self) -> Vec<String> {
        self.traces.lock().iter().map(|t| t.name.clone()).collect()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        *self.dimensions.lock()
    }
}

impl ChartSink for InMemoryChart {
    fn init_empty(&self) {
        self.traces.lock().clear();
    }

    fn add_trace(&self, trace: Trace) {
        self.traces.lock().push(trace);
    }

    fn extend_trace(&self, index: usize, point: SeriesPoint, max_retained: usize) {
        let mut traces = self.traces.lock();
        if let Some(trace) = traces.get_mut(index) {
            trace.points.push(point);
            let excess = trace.points.len().saturating_sub(max_retained.max(1));
            if excess > 0 {
                trace.points.drain(..excess);
            }
        }
    }

    fn delete_traces(&self, indices: &[usize]) {
        let mut traces = self.traces.lock();
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for index in sorted.into_iter().rev() {
            if index < traces.len() {
                traces.remove(index);
            }
        }
    }

    fn relayout(&self, dimensions: Dimensions) {
        *self.dimensions.lock() = Some(dimensions);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Readouts {
    pub numeric: BTreeMap<MetricId, f64>,
    pub boolean: BTreeMap<MetricId, bool>,
}

/// Readouts, indicator states and the most recent notices
#[derive(Default)]
pub struct InMemoryDisplay {
    numeric: DashMap<MetricId, f64>,
    boolean: DashMap<MetricId, bool>,
    notices: Mutex<VecDeque<Notice>>,
}

impl InMemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readout(&self, metric: &MetricId) -> Option<f64> {
        self.numeric.get(metric).map(|v| *v)
    }

    pub fn state(&self, metric: &MetricId) -> Option<bool> {
        self.boolean.get(metric).map(|v| *v)
    }

    pub fn readouts(&self) -> Readouts {
        Readouts {
            numeric: self
                .numeric
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            boolean: self
                .boolean
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().iter().cloned().collect()
    }
}

impl DisplaySink for InMemoryDisplay {
    fn set_numeric_readout(&self, metric: &MetricId, value: f64) {
        self.numeric.insert(metric.clone(), value);
    }

    fn set_boolean_state(&self, metric: &MetricId, state: bool) {
        self.boolean.insert(metric.clone(), state);
    }

    fn notify(&self, notice: Notice) {
        let mut notices = self.notices.lock();
        if notices.len() >= MAX_NOTICES {
            notices.pop_front();
        }
        notices.push_back(notice);
    }
}
