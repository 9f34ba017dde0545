//! Continuous mode
//!
//! The [`SyncRunner`] repeats [`SyncEngine`] runs until shutdown:
//!
//! ```text
//! run ──→ publish RunReport ──→ wait (poll interval | RunTrigger | shutdown)
//!  ↑                                         │
//!  └─────────────────────────────────────────┘
//! ```
//!
//! Every report goes to the registered [`IRunObserver`]s before it is
//! published, so observers see each run even when runs follow each other
//! faster than a `watch` receiver is polled.
//!
//! A failed run is reported and logged; the loop carries on after the next
//! wait. A [`RunTrigger`] cuts the wait short; a trigger that arrives while a
//! run is in progress starts another run right after it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use invbridge_core::domain::RunSummary;

use crate::engine::SyncEngine;

// ============================================================================
// RunReport
// ============================================================================

/// Outcome of one run, as published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunReport {
    Completed {
        summary: RunSummary,
    },
    Failed {
        error: String,
        kind: &'static str,
        finished_at: DateTime<Utc>,
    },
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self, RunReport::Completed { .. })
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunReport::Completed { summary } => Some(summary),
            RunReport::Failed { .. } => None,
        }
    }
}

// ============================================================================
// IRunObserver
// ============================================================================

/// Receives the report of every finished run, in order
///
/// Called on the runner's task; implementations must not block.
pub trait IRunObserver: Send + Sync {
    fn on_report(&self, report: &RunReport);
}

// ============================================================================
// RunTrigger
// ============================================================================

/// Cloneable handle that asks the runner to start a run now
#[derive(Debug, Clone)]
pub struct RunTrigger {
    notify: Arc<Notify>,
}

impl RunTrigger {
    /// Requests an immediate run
    ///
    /// Requests made while a run is in progress coalesce into a single
    /// follow-up run.
    pub fn request_run(&self) {
        info!("Immediate sync run requested");
        self.notify.notify_one();
    }
}

// ============================================================================
// SyncRunner
// ============================================================================

/// Drives the engine in continuous mode
pub struct SyncRunner {
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
    trigger: Arc<Notify>,
    reports: watch::Sender<Option<RunReport>>,
    observers: Vec<Arc<dyn IRunObserver>>,
}

impl SyncRunner {
    /// # Arguments
    /// * `engine` - The engine to run
    /// * `poll_interval` - Wait between the end of one run and the next
    pub fn new(engine: Arc<SyncEngine>, poll_interval: Duration) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            engine,
            poll_interval,
            trigger: Arc::new(Notify::new()),
            reports,
            observers: Vec::new(),
        }
    }

    /// Registers an observer that is handed every run's report
    pub fn with_observer(mut self, observer: Arc<dyn IRunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Handle for requesting runs from elsewhere (e.g. the HTTP trigger)
    pub fn trigger(&self) -> RunTrigger {
        RunTrigger {
            notify: self.trigger.clone(),
        }
    }

    /// Receiver that sees the latest published [`RunReport`]
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<RunReport>> {
        self.reports.subscribe()
    }

    /// The most recent report, if any run has finished
    pub fn last_report(&self) -> Option<RunReport> {
        self.reports.borrow().clone()
    }

    /// Performs a single run and publishes its report
    pub async fn run_once(&self, shutdown: &CancellationToken) -> RunReport {
        let report = match self.engine.sync_until_cancelled(shutdown).await {
            Ok(summary) => RunReport::Completed { summary },
            Err(err) => RunReport::Failed {
                error: err.to_string(),
                kind: error_kind(&err),
                finished_at: Utc::now(),
            },
        };
        for observer in &self.observers {
            observer.on_report(&report);
        }
        self.reports.send_replace(Some(report.clone()));
        report
    }

    /// Runs until `shutdown` is cancelled
    ///
    /// Never returns early because of a failed run.
    pub async fn run_forever(&self, shutdown: CancellationToken) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Sync loop started"
        );

        while !shutdown.is_cancelled() {
            let report = self.run_once(&shutdown).await;
            if !report.is_success() {
                debug!("Run failed, next attempt after the poll interval");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {
                    debug!("Poll interval elapsed");
                }
                _ = self.trigger.notified() => {
                    debug!("Run triggered");
                }
            }
        }

        info!("Sync loop stopped");
    }
}

fn error_kind(err: &invbridge_core::domain::SyncError) -> &'static str {
    use invbridge_core::domain::SyncError::*;
    match err {
        SourceUnavailable(_) => "source_unavailable",
        DestinationUnavailable(_) => "destination_unavailable",
        Mapping(_) => "mapping",
        Storage(_) => "storage",
        Cancelled => "cancelled",
        TimedOut(_) => "timed_out",
    }
}
