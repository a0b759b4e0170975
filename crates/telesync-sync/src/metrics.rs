//! Engine counters

use serde::Serialize;
use telesync_telemetry::{Counter, Gauge, Histogram, HistogramSummary};

#[derive(Clone)]
pub struct SyncMetrics {
    pub backfill_raw: Counter,
    pub backfill_aggregate: Counter,
    pub backfill_empty: Counter,
    pub backfill_failed: Counter,
    /// Traces released empty after the writer stalled
    pub writer_forced: Counter,
    pub live_applied: Counter,
    pub live_gate_miss: Counter,
    pub live_decode_failure: Counter,
    pub live_stale: Counter,
    pub reconnects: Counter,
    pub traces_written: Gauge,
    pub subscriptions: Gauge,
    pub fetch_latency_ms: Histogram,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            backfill_raw: Counter::new("backfill_raw"),
            backfill_aggregate: Counter::new("backfill_aggregate"),
            backfill_empty: Counter::new("backfill_empty"),
            backfill_failed: Counter::new("backfill_failed"),
            writer_forced: Counter::new("writer_forced"),
            live_applied: Counter::new("live_applied"),
            live_gate_miss: Counter::new("live_gate_miss"),
            live_decode_failure: Counter::new("live_decode_failure"),
            live_stale: Counter::new("live_stale"),
            reconnects: Counter::new("reconnects"),
            traces_written: Gauge::new("traces_written"),
            subscriptions: Gauge::new("subscriptions"),
            fetch_latency_ms: Histogram::new("fetch_latency_ms"),
        }
    }

    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            backfill_raw: self.backfill_raw.get(),
            backfill_aggregate: self.backfill_aggregate.get(),
            backfill_empty: self.backfill_empty.get(),
            backfill_failed: self.backfill_failed.get(),
            writer_forced: self.writer_forced.get(),
            live_applied: self.live_applied.get(),
            live_gate_miss: self.live_gate_miss.get(),
            live_decode_failure: self.live_decode_failure.get(),
            live_stale: self.live_stale.get(),
            reconnects: self.reconnects.get(),
            traces_written: self.traces_written.get(),
            subscriptions: self.subscriptions.get(),
            fetch_latency_ms: self.fetch_latency_ms.summary(),
        }
    }
}

/// Point-in-time copy of [`SyncMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    pub backfill_raw: u64,
    pub backfill_aggregate: u64,
    pub backfill_empty: u64,
    pub backfill_failed: u64,
    pub writer_forced: u64,
    pub live_applied: u64,
    pub live_gate_miss: u64,
    pub live_decode_failure: u64,
    pub live_stale: u64,
    pub reconnects: u64,
    pub traces_written: u64,
    pub subscriptions: u64,
    pub fetch_latency_ms: HistogramSummary,
}
