//! In-memory fakes for the engine's ports

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Semaphore;

use invbridge_core::domain::{
    Cursor, DestinationId, LedgerEntry, Page, RawRecord, RecordId, SyncError, TransformedDocument,
};
use invbridge_core::ports::{IDestinationSystem, ISourceSystem, IStateStore};
use invbridge_core::transform::InvoiceTransformer;
use invbridge_sync::{EngineSettings, SyncEngine};

pub const INITIAL_CURSOR: &str = "2025-01-01T00:00:00Z";

/// A valid fireTMS invoice
pub fn invoice(id: &str, gross: f64) -> RawRecord {
    RawRecord::new(json!({
        "id": id,
        "number": format!("FV/{id}"),
        "issueDate": "2025-08-01",
        "currency": "PLN",
        "buyer": {"nip": "5250001009", "name": "ACME", "address": "Warszawa"},
        "positions": [{"name": "Transport", "quantity": 1, "netPrice": gross, "vatRate": "zw."}],
        "totals": {"net": gross, "vat": 0, "gross": gross},
        "updatedAt": "2025-08-01T10:00:00Z"
    }))
}

/// An invoice the transformer rejects
pub fn broken_invoice(id: &str) -> RawRecord {
    RawRecord::new(json!({"id": id, "number": "FV/X", "issueDate": "yesterday"}))
}

// ============================================================================
// FakeSource
// ============================================================================

/// Serves a fixed list of pages; page `n` is `pages[n - 1]`
pub struct FakeSource {
    pages: Mutex<Vec<Result<Page, SyncError>>>,
    calls: Mutex<Vec<(String, u32, u32)>>,
}

impl FakeSource {
    pub fn new(pages: Vec<Result<Page, SyncError>>) -> Self {
        Self {
            pages: Mutex::new(pages),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// One page per record, each but the last reporting a next page
    pub fn one_record_per_page(records: Vec<RawRecord>) -> Self {
        let count = records.len();
        let pages = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| Ok(Page::new(vec![r], i + 1 < count)))
            .collect();
        Self::new(pages)
    }

    pub fn set_pages(&self, pages: Vec<Result<Page, SyncError>>) {
        *self.pages.lock().unwrap() = pages;
    }

    /// `(cursor, page, page_size)` of every call
    pub fn calls(&self) -> Vec<(String, u32, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ISourceSystem for FakeSource {
    async fn fetch_page(
        &self,
        since: &Cursor,
        page: u32,
        page_size: u32,
    ) -> Result<Page, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push((since.as_str().to_string(), page, page_size));
        let pages = self.pages.lock().unwrap();
        pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_else(|| Ok(Page::default()))
    }
}

// ============================================================================
// FakeDestination
// ============================================================================

/// Records upserts and tracks how many run at once
#[derive(Default)]
pub struct FakeDestination {
    upserts: Mutex<Vec<TransformedDocument>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upsert takes `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every upsert blocks until the test adds a permit to `gate`
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Upserts of `id` fail with `DestinationUnavailable`
    pub fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn upserted_ids(&self) -> Vec<String> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.source_id.to_string())
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IDestinationSystem for FakeDestination {
    async fn upsert(&self, document: &TransformedDocument) -> Result<DestinationId, SyncError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let id = document.source_id.as_str();
        if self.failing.lock().unwrap().contains(id) {
            return Err(SyncError::DestinationUnavailable(format!(
                "invoice {id}: HTTP 503"
            )));
        }

        self.upserts.lock().unwrap().push(document.clone());
        Ok(DestinationId::new(format!("OPT-{id}")).unwrap())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// `IStateStore` kept in memory, with switchable write failures
pub struct MemoryStore {
    default_cursor: Cursor,
    cursor: Mutex<Option<Cursor>>,
    ledger: Mutex<HashMap<RecordId, LedgerEntry>>,
    fail_ledger_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            default_cursor: Cursor::new(INITIAL_CURSOR).unwrap(),
            cursor: Mutex::new(None),
            ledger: Mutex::new(HashMap::new()),
            fail_ledger_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_ledger_writes(&self) {
        self.fail_ledger_writes.store(true, Ordering::SeqCst);
    }

    pub fn stored_cursor(&self) -> Option<Cursor> {
        self.cursor.lock().unwrap().clone()
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl IStateStore for MemoryStore {
    async fn get_cursor(&self) -> anyhow::Result<Cursor> {
        Ok(self
            .cursor
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.default_cursor.clone()))
    }

    async fn set_cursor(&self, cursor: &Cursor) -> anyhow::Result<()> {
        *self.cursor.lock().unwrap() = Some(cursor.clone());
        Ok(())
    }

    async fn get_ledger_entry(&self, id: &RecordId) -> anyhow::Result<Option<LedgerEntry>> {
        Ok(self.ledger.lock().unwrap().get(id).cloned())
    }

    async fn put_ledger_entry(&self, entry: &LedgerEntry) -> anyhow::Result<()> {
        if self.fail_ledger_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        self.ledger
            .lock()
            .unwrap()
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn count_ledger_by_status(&self) -> anyhow::Result<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        for entry in self.ledger.lock().unwrap().values() {
            *counts.entry(entry.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

// ============================================================================
// Engine construction
// ============================================================================

pub fn settings(concurrency: usize) -> EngineSettings {
    EngineSettings {
        concurrency,
        page_size: 50,
        run_timeout: None,
    }
}

pub fn engine(
    source: Arc<FakeSource>,
    destination: Arc<FakeDestination>,
    state: Arc<dyn IStateStore>,
    settings: EngineSettings,
) -> SyncEngine {
    SyncEngine::new(
        source,
        destination,
        Arc::new(InvoiceTransformer::new()),
        state,
        settings,
    )
}
