//! Prometheus metrics for the sync loop
//!
//! [`SyncMetrics`] is registered on the runner as an [`IRunObserver`], so
//! every [`RunReport`] is counted exactly once and the engine itself stays
//! free of metrics code.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::debug;

use invbridge_sync::{IRunObserver, RunReport};

/// Central metrics registry for the daemon.
pub struct SyncMetrics {
    registry: Registry,
    /// Counter: records handled by outcome (synced, skipped, failed)
    pub records_total: IntCounterVec,
    /// Counter: runs by result (completed, failed)
    pub runs_total: IntCounterVec,
    /// Gauge: unix time of the last completed run
    pub last_success_timestamp_seconds: IntGauge,
}

impl SyncMetrics {
    /// Creates a new `SyncMetrics` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("invbridge".to_string()), None)?;

        let records_total = IntCounterVec::new(
            Opts::new("records_total", "Records handled by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(records_total.clone()))?;

        let runs_total = IntCounterVec::new(
            Opts::new("runs_total", "Sync runs by result"),
            &["result"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let last_success_timestamp_seconds = IntGauge::new(
            "last_success_timestamp_seconds",
            "Unix time at which the last completed run started",
        )?;
        registry.register(Box::new(last_success_timestamp_seconds.clone()))?;

        Ok(Self {
            registry,
            records_total,
            runs_total,
            last_success_timestamp_seconds,
        })
    }

    /// Adds one run's outcome to the counters
    pub fn observe(&self, report: &RunReport) {
        match report {
            RunReport::Completed { summary } => {
                self.runs_total.with_label_values(&["completed"]).inc();
                self.records_total
                    .with_label_values(&["synced"])
                    .inc_by(summary.synced);
                self.records_total
                    .with_label_values(&["skipped"])
                    .inc_by(summary.skipped);
                self.records_total
                    .with_label_values(&["failed"])
                    .inc_by(summary.failed);
                self.last_success_timestamp_seconds
                    .set(summary.started_at.timestamp());
            }
            RunReport::Failed { kind, .. } => {
                self.runs_total.with_label_values(&["failed"]).inc();
                debug!(kind = %kind, "Counted failed run");
            }
        }
    }

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl IRunObserver for SyncMetrics {
    fn on_report(&self, report: &RunReport) {
        self.observe(report);
    }
}
