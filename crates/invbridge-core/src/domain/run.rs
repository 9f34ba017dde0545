//! Run lifecycle types
//!
//! [`RunPhase`] is the state machine a single synchronization run moves
//! through; [`RunSummary`] is what the run reports when it completes.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Cursor, RunId};

// ============================================================================
// RunPhase
// ============================================================================

/// Phase of the synchronization run loop
///
/// ```text
/// Idle ──→ FetchingPage ──→ ProcessingBatch ──→ FetchingPage (more pages)
///               │                  │
///               │                  └──────────→ Draining ──→ Idle
///               ├──────────────────────────────→ Draining (empty / last page)
///               └──→ Aborted (fatal error, cursor untouched)
/// ```
///
/// A run that cannot read its cursor goes straight from `Idle` to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    FetchingPage,
    ProcessingBatch,
    Draining,
    Aborted,
}

impl RunPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::FetchingPage => "fetching_page",
            RunPhase::ProcessingBatch => "processing_batch",
            RunPhase::Draining => "draining",
            RunPhase::Aborted => "aborted",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle | Aborted, FetchingPage)
                | (Idle, Aborted)
                | (FetchingPage, ProcessingBatch | Draining | Aborted)
                | (ProcessingBatch, FetchingPage | Draining | Aborted)
                | (Draining, Idle | Aborted)
        )
    }
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// RunSummary
// ============================================================================

/// Upper bound on error messages kept in a summary; `failed` stays exact
pub const MAX_REPORTED_ERRORS: usize = 100;

/// Result of processing a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Written to the destination and recorded in the ledger
    Synced,
    /// Ledger already holds an identical synced document
    Skipped,
}

/// Summary of a completed synchronization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// Records handled, successfully or not
    pub processed: u64,
    /// Records written to the destination
    pub synced: u64,
    /// Records skipped because they were unchanged
    pub skipped: u64,
    /// Records that failed mapping or delivery
    pub failed: u64,
    /// Pages fetched from the source
    pub pages: u32,
    /// Per-record failure messages (at most [`MAX_REPORTED_ERRORS`])
    pub errors: Vec<String>,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
    /// Cursor the run fetched from
    pub cursor_before: Cursor,
    /// Cursor persisted at the end of the run
    pub cursor_after: Option<Cursor>,
}

impl RunSummary {
    pub fn new(run_id: RunId, cursor_before: Cursor) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            processed: 0,
            synced: 0,
            skipped: 0,
            failed: 0,
            pages: 0,
            errors: Vec::new(),
            duration_ms: 0,
            cursor_before,
            cursor_after: None,
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Synced => self.synced += 1,
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn record_failure(&mut self, message: String) {
        self.processed += 1;
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }

    /// True when nothing had to be written
    pub fn is_up_to_date(&self) -> bool {
        self.synced == 0 && self.failed == 0
    }
}
