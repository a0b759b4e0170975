//! Ordered trace insertion
//!
//! Backfills finish in any order, but traces must land on the chart in
//! catalog order. Results are submitted to a single coordinator task that
//! holds them until every lower index has been written.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backfill::BackfillOutcome;
use crate::context::{Insertion, SyncContext};

#[derive(Debug)]
struct Submission {
    generation: u64,
    index: usize,
    outcome: BackfillOutcome,
}

/// Handle to the coordinator task
#[derive(Clone)]
pub struct OrderedSeriesWriter {
    submissions: mpsc::UnboundedSender<Submission>,
}

impl OrderedSeriesWriter {
    pub fn spawn(context: Arc<SyncContext>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = WriterTask {
            context,
            submissions: rx,
            generation: None,
            pending: BTreeMap::new(),
            stalls: 0,
        };
        let handle = tokio::spawn(task.run());
        (Self { submissions: tx }, handle)
    }

    /// Queue the backfill result for trace `index` of `generation`.
    ///
    /// Returns false once the coordinator has stopped.
    pub fn submit(&self, generation: u64, index: usize, outcome: BackfillOutcome) -> bool {
        self.submissions
            .send(Submission {
                generation,
                index,
                outcome,
            })
            .is_ok()
    }
}

struct WriterTask {
    context: Arc<SyncContext>,
    submissions: mpsc::UnboundedReceiver<Submission>,
    /// Generation the pending results belong to
    generation: Option<u64>,
    pending: BTreeMap<usize, BackfillOutcome>,
    /// Consecutive checks without progress while results are waiting
    stalls: u32,
}

impl WriterTask {
    async fn run(mut self) {
        let mut ticker = interval(self.context.config().writer_retry_delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.pending.is_empty() {
                match self.submissions.recv().await {
                    Some(submission) => self.accept(submission),
                    None => break,
                }
                ticker.reset();
            } else {
                tokio::select! {
                    submission = self.submissions.recv() => match submission {
                        Some(submission) => self.accept(submission),
                        None => break,
                    },
                    _ = ticker.tick() => self.on_stalled_check(),
                }
            }
            self.flush();
        }

        debug!(pending = self.pending.len(), "Ordered writer stopped");
    }

    fn accept(&mut self, submission: Submission) {
        let Submission {
            generation,
            index,
            outcome,
        } = submission;

        match self.generation {
            Some(current) if generation < current => {
                debug!(generation, index, "Dropping result of a replaced window");
                return;
            }
            Some(current) if generation == current => {}
            _ => {
                if !self.pending.is_empty() {
                    debug!(dropped = self.pending.len(), "Window replaced, dropping queued results");
                }
                self.pending.clear();
                self.generation = Some(generation);
                self.stalls = 0;
            }
        }

        match self.context.next_index(generation) {
            None => {
                debug!(generation, index, "Dropping result of a replaced window");
            }
            Some(next) if index < next => {
                warn!(
                    generation,
                    index, "Late backfill result for a trace already written, discarding"
                );
            }
            Some(_) => {
                self.pending.insert(index, outcome);
            }
        }
    }

    /// Write every consecutive result starting at the next due index
    fn flush(&mut self) {
        let Some(generation) = self.generation else {
            return;
        };

        loop {
            let Some(next) = self.context.next_index(generation) else {
                self.pending.clear();
                return;
            };
            let Some(outcome) = self.pending.remove(&next) else {
                return;
            };

            match self.context.insert_trace(generation, next, outcome) {
                Insertion::Inserted(state) => {
                    debug!(generation, index = next, ?state, "Trace written");
                    self.stalls = 0;
                }
                Insertion::Stale => {
                    self.pending.clear();
                    return;
                }
                Insertion::NotNext { next: due } => {
                    warn!(index = next, due, "Trace index moved while writing");
                    return;
                }
                Insertion::Unknown => {
                    warn!(index = next, "No series for trace index");
                    return;
                }
            }
        }
    }

    fn on_stalled_check(&mut self) {
        let Some(generation) = self.generation else {
            return;
        };
        let Some(next) = self.context.next_index(generation) else {
            self.pending.clear();
            return;
        };

        self.stalls += 1;
        if self.stalls < self.context.config().writer_max_retries {
            return;
        }

        warn!(
            generation,
            index = next,
            waiting = self.pending.len(),
            "Backfill stalled, releasing trace empty"
        );
        let outcome = BackfillOutcome::empty(self.context.config().max_chart_points);
        if let Insertion::Inserted(_) = self.context.insert_trace(generation, next, outcome) {
            self.context.metrics().writer_forced.inc();
            info!(index = next, "Stalled trace released");
        }
        self.stalls = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use telesync_core::SeriesPoint;

    use crate::catalog::{Metric, MetricCatalog};
    use crate::context::SyncState;
    use crate::metrics::SyncMetrics;
    use crate::range::Window;
    use crate::sink::{InMemoryChart, InMemoryDisplay};
    use crate::SyncConfig;

    fn setup(max_retries: u32) -> (Arc<SyncContext>, Arc<InMemoryChart>) {
        let catalog = MetricCatalog::new(vec![
            Metric::series("a", "A"),
            Metric::series("b", "B"),
            Metric::series("c", "C"),
        ])
        .unwrap();
        let chart = Arc::new(InMemoryChart::new());
        let config = SyncConfig {
            writer_retry_delay: Duration::from_millis(5),
            writer_max_retries: max_retries,
            ..SyncConfig::default()
        };
        let ctx = SyncContext::new(
            Arc::new(catalog),
            config,
            chart.clone(),
            Arc::new(InMemoryDisplay::new()),
            SyncMetrics::new(),
        )
        .unwrap();
        (Arc::new(ctx), chart)
    }

    fn outcome(ts: i64) -> BackfillOutcome {
        BackfillOutcome::Series {
            points: vec![SeriesPoint::new(ts, 0.0)],
            max_retained: 10,
        }
    }

    async fn wait_for_written(ctx: &SyncContext, n: usize) {
        for _ in 0..200 {
            if ctx.written() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("only {} of {} traces written", ctx.written(), n);
    }

    #[tokio::test]
    async fn test_reverse_completion_order_is_written_in_index_order() {
        let (ctx, chart) = setup(1500);
        let (writer, _handle) = OrderedSeriesWriter::spawn(ctx.clone());
        let gen = ctx.generation();

        assert!(writer.submit(gen, 2, outcome(3)));
        assert!(writer.submit(gen, 1, outcome(2)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ctx.written(), 0);

        writer.submit(gen, 0, outcome(1));
        wait_for_written(&ctx, 3).await;
        assert_eq!(chart.trace_names(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let (ctx, chart) = setup(1500);
        let (writer, _handle) = OrderedSeriesWriter::spawn(ctx.clone());
        let old = ctx.generation();
        let snap = ctx.replace_window(Window::new(0, 10, false).unwrap());

        writer.submit(old, 0, outcome(1));
        writer.submit(snap.generation, 0, outcome(2));
        wait_for_written(&ctx, 1).await;

        let traces = chart.traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].points[0].timestamp, 2);
    }

    #[tokio::test]
    async fn test_stalled_index_is_released_empty() {
        let (ctx, chart) = setup(3);
        let (writer, _handle) = OrderedSeriesWriter::spawn(ctx.clone());
        let gen = ctx.generation();

        writer.submit(gen, 1, outcome(5));
        wait_for_written(&ctx, 2).await;

        assert_eq!(ctx.sync_state(0), Some(SyncState::Inserted));
        assert!(chart.traces()[0].points.is_empty());
        assert_eq!(chart.traces()[1].points.len(), 1);
        assert_eq!(ctx.metrics().writer_forced.get(), 1);

        // the real result for index 0 shows up after the release
        writer.submit(gen, 0, outcome(9));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(chart.traces().len(), 2);
        assert!(chart.traces()[0].points.is_empty());
    }
}
