//! Shared chart state
//!
//! Everything the sync tasks mutate lives in one [`ChartState`] behind a single
//! lock: the active window, one slot per series and the written-trace count.
//! A window replacement clears the chart under the same lock, and every
//! insertion re-checks the generation under it, so stale work can never land
//! after a reset. No sink call awaits, so nothing yields while the lock is held.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use telesync_core::{now_millis, MetricId, SeriesPoint};

use crate::backfill::BackfillOutcome;
use crate::buffer::{Append, ChartBuffer};
use crate::catalog::{Axis, MetricCatalog};
use crate::metrics::SyncMetrics;
use crate::range::{RangeController, Window, WindowSnapshot};
use crate::sink::{ChartSink, DisplaySink, Notice, Trace};
use crate::{Result, SyncConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Fetching,
    Inserted,
    Failed,
}

#[derive(Debug)]
struct MetricSlot {
    state: SyncState,
    max_retained: usize,
    buffer: Option<ChartBuffer>,
}

impl MetricSlot {
    fn idle(max_retained: usize) -> Self {
        Self {
            state: SyncState::Idle,
            max_retained,
            buffer: None,
        }
    }
}

#[derive(Debug)]
struct ChartState {
    range: RangeController,
    slots: Vec<MetricSlot>,
    written: usize,
}

/// Result of an ordered insertion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted(SyncState),
    /// The generation was replaced meanwhile
    Stale,
    /// Another index is due first
    NotNext { next: usize },
    /// No series has this index
    Unknown,
}

/// Result of offering a live point to a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveApply {
    Applied,
    GateMiss,
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceView {
    pub metric: MetricId,
    pub name: String,
    pub axis: Axis,
    pub state: SyncState,
    pub max_retained: usize,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSnapshot {
    pub window: WindowSnapshot,
    pub written: usize,
    pub traces: Vec<TraceView>,
}

pub struct SyncContext {
    catalog: Arc<MetricCatalog>,
    config: SyncConfig,
    state: Mutex<ChartState>,
    chart: Arc<dyn ChartSink>,
    display: Arc<dyn DisplaySink>,
    metrics: SyncMetrics,
}

impl SyncContext {
    pub fn new(
        catalog: Arc<MetricCatalog>,
        config: SyncConfig,
        chart: Arc<dyn ChartSink>,
        display: Arc<dyn DisplaySink>,
        metrics: SyncMetrics,
    ) -> Result<Self> {
        config.validate()?;
        let initial = Window::live(now_millis(), config.default_span_millis())?;
        let slots = (0..catalog.series_len())
            .map(|_| MetricSlot::idle(config.max_chart_points))
            .collect();

        chart.init_empty();

        Ok(Self {
            catalog,
            state: Mutex::new(ChartState {
                range: RangeController::new(initial),
                slots,
                written: 0,
            }),
            config,
            chart,
            display,
            metrics,
        })
    }

    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    pub fn chart(&self) -> &Arc<dyn ChartSink> {
        &self.chart
    }

    pub fn display(&self) -> &Arc<dyn DisplaySink> {
        &self.display
    }

    pub fn notify(&self, notice: Notice) {
        self.display.notify(notice);
    }

    pub fn current_window(&self) -> WindowSnapshot {
        self.state.lock().range.current_window()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().range.generation()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.state.lock().range.is_current(generation)
    }

    /// Replace the window and clear the chart atomically
    pub fn replace_window(&self, window: Window) -> WindowSnapshot {
        let mut state = self.state.lock();
        let snapshot = state.range.replace(window);
        self.clear_locked(&mut state);
        debug!(
            generation = snapshot.generation,
            start = window.start,
            end = window.end,
            realtime = window.realtime,
            "Window replaced"
        );
        snapshot
    }

    pub fn set_realtime(&self, realtime: bool) {
        self.state.lock().range.set_realtime(realtime);
    }

    fn clear_locked(&self, state: &mut ChartState) {
        if state.written > 0 {
            let indices: Vec<usize> = (0..state.written).collect();
            self.chart.delete_traces(&indices);
        }
        for slot in state.slots.iter_mut() {
            *slot = MetricSlot::idle(self.config.max_chart_points);
        }
        state.written = 0;
        self.metrics.traces_written.set(0);
    }

    /// Mark a series as fetching. Returns false if `generation` is stale.
    pub fn mark_fetching(&self, generation: u64, index: usize) -> bool {
        let mut state = self.state.lock();
        if !state.range.is_current(generation) {
            return false;
        }
        match state.slots.get_mut(index) {
            Some(slot) if slot.state == SyncState::Idle => {
                slot.state = SyncState::Fetching;
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Next trace index due for `generation`, or `None` if it is stale
    pub fn next_index(&self, generation: u64) -> Option<usize> {
        let state = self.state.lock();
        state.range.is_current(generation).then_some(state.written)
    }

    pub fn written(&self) -> usize {
        self.state.lock().written
    }

    pub fn sync_state(&self, index: usize) -> Option<SyncState> {
        self.state.lock().slots.get(index).map(|s| s.state)
    }

    /// Insert the trace for `index` if it is the next one due.
    ///
    /// A failed outcome still takes its trace slot, empty, so trace positions
    /// keep matching catalog positions; its state stays `Failed`.
    pub fn insert_trace(&self, generation: u64, index: usize, outcome: BackfillOutcome) -> Insertion {
        let mut state = self.state.lock();
        if !state.range.is_current(generation) {
            return Insertion::Stale;
        }
        if index != state.written {
            return Insertion::NotNext {
                next: state.written,
            };
        }
        let Some(metric) = self.catalog.series_at(index) else {
            return Insertion::Unknown;
        };

        let (points, max_retained, sync_state) = match outcome {
            BackfillOutcome::Series {
                points,
                max_retained,
            } => (points, max_retained, SyncState::Inserted),
            BackfillOutcome::Failed { .. } => {
                (Vec::new(), self.config.max_chart_points, SyncState::Failed)
            }
        };
        let buffer = ChartBuffer::with_points(points, max_retained);

        self.chart.add_trace(Trace {
            metric: metric.id.clone(),
            name: metric.name.clone(),
            axis: metric.axis,
            points: buffer.to_vec(),
        });

        let slot = &mut state.slots[index];
        slot.state = sync_state;
        slot.max_retained = buffer.capacity();
        slot.buffer = Some(buffer);

        state.written += 1;
        self.metrics.traces_written.set(state.written as u64);

        Insertion::Inserted(sync_state)
    }

    /// Offer a live point to series `index`.
    ///
    /// Applied only when the series is `Inserted` and the window is in
    /// real-time mode.
    pub fn apply_live(&self, index: usize, point: SeriesPoint) -> LiveApply {
        let mut state = self.state.lock();
        let realtime = state.range.is_realtime();
        let Some(slot) = state.slots.get_mut(index) else {
            return LiveApply::GateMiss;
        };
        if !realtime || slot.state != SyncState::Inserted {
            return LiveApply::GateMiss;
        }
        let Some(buffer) = slot.buffer.as_mut() else {
            return LiveApply::GateMiss;
        };

        match buffer.push(point) {
            Append::Stale => LiveApply::Stale,
            Append::Stored | Append::Evicted(_) => {
                self.chart.extend_trace(index, point, buffer.capacity());
                LiveApply::Applied
            }
        }
    }

    pub fn snapshot(&self) -> ChartSnapshot {
        let state = self.state.lock();
        let traces = self
            .catalog
            .series()
            .zip(state.slots.iter())
            .map(|(metric, slot)| TraceView {
                metric: metric.id.clone(),
                name: metric.name.clone(),
                axis: metric.axis,
                state: slot.state,
                max_retained: slot.max_retained,
                points: slot.buffer.as_ref().map(|b| b.to_vec()).unwrap_or_default(),
            })
            .collect();

        ChartSnapshot {
            window: state.range.current_window(),
            written: state.written,
            traces,
        }
    }
}
