//! Fixed-cadence detection loop.

use crate::{
    arbitrage::{ArbitrageCycle, ArbitrageDetector},
    graph::ExchangeRateGraph,
    report::OpportunityReporter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Result of a single detection tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Graph below the two-vertex / two-edge minimum; detector not run.
    Waiting { vertices: usize, edges: usize },
    /// Detector ran over a snapshot of this size.
    Completed {
        vertices: usize,
        edges: usize,
        cycles: Vec<ArbitrageCycle>,
    },
}

/// Snapshots the shared graph on a timer and runs the detector on the copy.
/// Holds no write access to the graph.
pub struct DetectionScheduler {
    graph: Arc<ExchangeRateGraph>,
    detector: ArbitrageDetector,
    reporter: Arc<dyn OpportunityReporter>,
    interval: Duration,
    heartbeat_every: u64,
}

impl DetectionScheduler {
    pub fn new(
        graph: Arc<ExchangeRateGraph>,
        detector: ArbitrageDetector,
        reporter: Arc<dyn OpportunityReporter>,
        interval: Duration,
        heartbeat_every: u64,
    ) -> Self {
        Self {
            graph,
            detector,
            reporter,
            interval,
            heartbeat_every: heartbeat_every.max(1),
        }
    }

    /// One tick: snapshot, detect, report.
    pub async fn run_once(&self) -> DetectionOutcome {
        // Read lock is held only inside `snapshot`.
        let snapshot = self.graph.snapshot().await;
        let (vertices, edges) = (snapshot.vertex_count(), snapshot.edge_count());
        if !snapshot.has_minimum_data() {
            return DetectionOutcome::Waiting { vertices, edges };
        }

        let cycles = self.detector.detect(&snapshot);
        for cycle in &cycles {
            self.reporter.report(cycle);
        }
        DetectionOutcome::Completed {
            vertices,
            edges,
            cycles,
        }
    }

    /// Tick until the shutdown flag flips or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        let mut ticks: u64 = 0;
        tracing::info!(
            interval = ?self.interval,
            min_profit_epsilon = self.detector.config().min_profit_epsilon,
            "[INIT] detection scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            ticks += 1;

            match self.run_once().await {
                DetectionOutcome::Waiting { vertices, edges } => {
                    if vertices < 2 {
                        tracing::info!(vertices, "[HEARTBEAT] waiting for sufficient vertices");
                    } else {
                        tracing::info!(edges, "[HEARTBEAT] waiting for sufficient edges");
                    }
                }
                DetectionOutcome::Completed { cycles, .. } if !cycles.is_empty() => {
                    tracing::info!(count = cycles.len(), "[OPP] arbitrage opportunities found");
                }
                DetectionOutcome::Completed { vertices, edges, .. } => {
                    if ticks % self.heartbeat_every == 0 {
                        tracing::info!(vertices, edges, "[HEARTBEAT] no opportunities");
                    }
                }
            }
        }
        tracing::info!(ticks, "[SHUTDOWN] detection scheduler stopped");
    }
}

/// Spawn the scheduler loop on the runtime.
pub fn spawn_detection_scheduler(
    scheduler: DetectionScheduler,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(scheduler.run(shutdown))
}
