//! Synchronization run
//!
//! The [`SyncEngine`] performs one incremental pass from the source system
//! to the destination system.
//!
//! ## Run Flow
//!
//! 1. **Cursor**: read the persisted cursor (fatal on storage failure)
//! 2. **Crawl**: fetch pages sequentially, `page = 1, 2, ...` until a page is
//!    empty or reports no further page
//! 3. **Batch**: process the records of each page concurrently, bounded by
//!    a semaphore of `concurrency` permits
//! 4. **Per record**: transform, hash, skip if the ledger already holds the
//!    same synced hash, otherwise upsert and record the ledger entry
//! 5. **Drain**: once every page is done, persist the cursor as the run's
//!    start time (never moving it backwards)
//!
//! ## Failure Model
//!
//! Mapping and destination failures are counted per record and never stop
//! the batch. `SourceUnavailable`, storage failures, cancellation and the
//! run timeout abort the run with the cursor untouched, so the next run
//! re-reads the same window and skips whatever was already delivered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use invbridge_core::config::Config;
use invbridge_core::domain::{
    content_hash, Cursor, LedgerEntry, RawRecord, RecordOutcome, RunId, RunPhase, RunSummary,
    SyncError,
};
use invbridge_core::ports::{IDestinationSystem, IRecordTransformer, ISourceSystem, IStateStore};

/// Label used for records whose `id` cannot be read
const UNKNOWN_RECORD: &str = "<unknown>";

// ============================================================================
// EngineSettings
// ============================================================================

/// Tuning knobs for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Maximum records of one page processed at the same time
    pub concurrency: usize,
    /// Records requested per page
    pub page_size: u32,
    /// Upper bound on a whole run
    pub run_timeout: Option<Duration>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.sync.concurrency,
            page_size: config.sync.page_size,
            run_timeout: config.sync.run_timeout(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            page_size: 50,
            run_timeout: None,
        }
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Incremental source → destination synchronization
///
/// ## Dependencies
///
/// - `source`: paged reads of records updated since the cursor
/// - `destination`: idempotent upserts of transformed documents
/// - `transformer`: pure record mapping
/// - `state`: cursor and ledger persistence
///
/// Runs never overlap: concurrent calls to [`SyncEngine::sync_once`] queue
/// behind each other.
pub struct SyncEngine {
    source: Arc<dyn ISourceSystem>,
    destination: Arc<dyn IDestinationSystem>,
    transformer: Arc<dyn IRecordTransformer>,
    state: Arc<dyn IStateStore>,
    settings: EngineSettings,
    phase: watch::Sender<RunPhase>,
    run_lock: Mutex<()>,
}

impl SyncEngine {
    /// Creates a new engine with the given adapters
    ///
    /// # Arguments
    /// * `source` - Source system reader (ISourceSystem)
    /// * `destination` - Destination system writer (IDestinationSystem)
    /// * `transformer` - Record mapping (IRecordTransformer)
    /// * `state` - Cursor and ledger storage (IStateStore)
    /// * `settings` - Concurrency, page size and run timeout
    pub fn new(
        source: Arc<dyn ISourceSystem>,
        destination: Arc<dyn IDestinationSystem>,
        transformer: Arc<dyn IRecordTransformer>,
        state: Arc<dyn IStateStore>,
        settings: EngineSettings,
    ) -> Self {
        let settings = EngineSettings {
            concurrency: settings.concurrency.max(1),
            page_size: settings.page_size.max(1),
            ..settings
        };
        let (phase, _) = watch::channel(RunPhase::Idle);

        Self {
            source,
            destination,
            transformer,
            state,
            settings,
            phase,
            run_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The state store this engine writes to
    pub fn state(&self) -> &Arc<dyn IStateStore> {
        &self.state
    }

    /// Current phase of the run loop
    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Receiver that observes every phase change
    pub fn subscribe_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, next: RunPhase) {
        let prev = self.phase.send_replace(next);
        if prev == next {
            return;
        }
        debug_assert!(
            prev.can_transition_to(next),
            "illegal run phase transition {prev} -> {next}"
        );
        trace!(from = %prev, to = %next, "Run phase changed");
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Performs one complete synchronization run
    ///
    /// # Errors
    ///
    /// `SourceUnavailable`, `Storage` or `TimedOut`; the cursor is unchanged.
    pub async fn sync_once(&self) -> Result<RunSummary, SyncError> {
        self.sync_until_cancelled(&CancellationToken::new()).await
    }

    /// Like [`SyncEngine::sync_once`], but stops promptly when `cancel` fires
    ///
    /// In-flight source and destination calls are dropped. Anything they had
    /// already committed is skipped cheaply on the next run.
    ///
    /// # Errors
    ///
    /// As [`SyncEngine::sync_once`], plus `SyncError::Cancelled`.
    pub async fn sync_until_cancelled(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, SyncError> {
        let _guard = self.run_lock.lock().await;

        let run_id = RunId::new();
        let started = Instant::now();
        let run_started_at = Utc::now();
        let span = info_span!("sync_run", run_id = %run_id);

        let crawl = self.crawl(run_id, run_started_at, started).instrument(span);
        let result = match self.settings.run_timeout {
            Some(limit) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SyncError::Cancelled),
                    outcome = tokio::time::timeout(limit, crawl) => {
                        outcome.unwrap_or(Err(SyncError::TimedOut(limit)))
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SyncError::Cancelled),
                    outcome = crawl => outcome,
                }
            }
        };

        match &result {
            Ok(summary) => {
                info!(
                    run_id = %run_id,
                    processed = summary.processed,
                    synced = summary.synced,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    pages = summary.pages,
                    duration_ms = summary.duration_ms,
                    "Sync run completed"
                );
            }
            Err(err) => {
                self.set_phase(RunPhase::Aborted);
                error!(
                    run_id = %run_id,
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sync run aborted, cursor unchanged"
                );
            }
        }

        result
    }

    // ========================================================================
    // Crawl
    // ========================================================================

    async fn crawl(
        &self,
        run_id: RunId,
        run_started_at: DateTime<Utc>,
        started: Instant,
    ) -> Result<RunSummary, SyncError> {
        let cursor_before = self.state.get_cursor().await.map_err(SyncError::storage)?;
        let mut summary = RunSummary::new(run_id, cursor_before.clone());
        summary.started_at = run_started_at;

        info!(cursor = %cursor_before, "Starting sync run");

        let mut page_number = 1u32;
        loop {
            self.set_phase(RunPhase::FetchingPage);
            let page = self
                .source
                .fetch_page(&cursor_before, page_number, self.settings.page_size)
                .await?;
            summary.pages += 1;

            if page.is_empty() {
                debug!(page = page_number, "Empty page, crawl finished");
                break;
            }

            self.set_phase(RunPhase::ProcessingBatch);
            let has_more = page.has_more;
            debug!(page = page_number, records = page.items.len(), "Processing page");
            self.process_batch(page.items, &mut summary).await?;

            if !has_more {
                break;
            }
            page_number += 1;
        }

        // Every record of every page has settled before the cursor moves
        self.set_phase(RunPhase::Draining);
        let cursor_after = cursor_before.advance_to(Cursor::from_datetime(run_started_at));
        self.state
            .set_cursor(&cursor_after)
            .await
            .map_err(SyncError::storage)?;
        debug!(cursor = %cursor_after, "Cursor advanced");

        summary.cursor_after = Some(cursor_after);
        summary.duration_ms = started.elapsed().as_millis() as u64;
        self.set_phase(RunPhase::Idle);

        Ok(summary)
    }

    /// Processes one page, at most `concurrency` records at a time
    ///
    /// Returns early with the first fatal error; the remaining records of
    /// the page are dropped.
    async fn process_batch(
        &self,
        records: Vec<RawRecord>,
        summary: &mut RunSummary,
    ) -> Result<(), SyncError> {
        let semaphore = Semaphore::new(self.settings.concurrency);
        let semaphore = &semaphore;

        let mut pending: FuturesUnordered<_> = records
            .into_iter()
            .map(|record| async move {
                let label = record
                    .id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| UNKNOWN_RECORD.to_string());
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.process_record(&label, record).await,
                    Err(_) => Err(SyncError::Cancelled),
                };
                (label, result)
            })
            .collect();

        while let Some((label, result)) = pending.next().await {
            match result {
                Ok(outcome) => summary.record(outcome),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(record_id = %label, error = %err, "Record failed");
                    summary.record_failure(format!("{label}: {err}"));
                }
            }
        }

        Ok(())
    }

    /// Transform → hash → ledger check → upsert → ledger write
    async fn process_record(
        &self,
        label: &str,
        record: RawRecord,
    ) -> Result<RecordOutcome, SyncError> {
        let document = self.transformer.transform(&record)?;
        let hash = content_hash(&document.body);

        let existing = self
            .state
            .get_ledger_entry(&document.source_id)
            .await
            .map_err(SyncError::storage)?;
        if let Some(entry) = existing {
            if entry.is_current(&hash) {
                debug!(record_id = %label, "Unchanged since last sync, skipping");
                return Ok(RecordOutcome::Skipped);
            }
        }

        let destination_id = self.destination.upsert(&document).await?;

        let entry = LedgerEntry::synced(document.source_id, hash, destination_id.clone());
        self.state
            .put_ledger_entry(&entry)
            .await
            .map_err(SyncError::storage)?;

        info!(record_id = %label, destination_id = %destination_id, "Record synced");
        Ok(RecordOutcome::Synced)
    }
}
