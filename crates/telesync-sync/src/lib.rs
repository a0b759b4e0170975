//! # Telesync synchronization engine
//!
//! Keeps a live chart of several telemetry metrics consistent while its data
//! arrives from two places: a one-off historical backfill per metric and a
//! push subscription delivering new points.
//!
//! - **catalog** - tracked metrics and their trace order
//! - **range** - active window and its generation
//! - **backfill** - raw vs. aggregated historical retrieval
//! - **writer** - catalog-ordered trace insertion
//! - **realtime** - live subscriptions and the insertion gate
//! - **reconnect** - transport lifecycle handling
//!
//! ## Example
//! ```rust,ignore
//! use telesync_sync::{InMemoryChart, InMemoryDisplay, MetricCatalog, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(config, catalog, source, transport, chart, display)?;
//! engine.start().await?;
//! tokio::spawn(engine.clone().run(events));
//! ```

pub mod backfill;
pub mod buffer;
pub mod catalog;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod range;
pub mod realtime;
pub mod reconnect;
pub mod sink;
pub mod writer;

pub use backfill::{plan, BackfillFetcher, BackfillOutcome, FetchPlan};
pub use buffer::{Append, ChartBuffer};
pub use catalog::{Axis, Metric, MetricCatalog, MetricKind, ValueKind};
pub use config::SyncConfig;
pub use context::{ChartSnapshot, SyncContext, SyncState, TraceView};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use metrics::{SyncMetrics, SyncStats};
pub use range::{RangeController, Window, WindowSnapshot};
pub use realtime::{decode_payload, LiveOutcome, RealtimeSubscriber, Route, SubscriptionSet};
pub use reconnect::{Reaction, ReconnectionManager, TransportState};
pub use sink::{
    ChartSink, Dimensions, DisplaySink, InMemoryChart, InMemoryDisplay, Notice, NoticeKind,
    Readouts, Trace,
};
pub use writer::OrderedSeriesWriter;
