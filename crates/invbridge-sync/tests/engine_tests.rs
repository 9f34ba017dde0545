//! Integration tests for SyncEngine
//!
//! The engine runs against in-memory fakes for the source and destination.
//! The state store is the real SQLite adapter (in-memory database) unless a
//! test needs to inject storage failures.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use invbridge_core::config::ConfigBuilder;
use invbridge_core::domain::{
    content_hash, Cursor, LedgerStatus, Page, RecordId, RunPhase, SyncError,
};
use invbridge_core::ports::{IRecordTransformer, IStateStore};
use invbridge_core::transform::InvoiceTransformer;
use invbridge_state::{DatabasePool, SqliteStateStore};
use invbridge_sync::EngineSettings;

use common::{
    broken_invoice, engine, invoice, settings, FakeDestination, FakeSource, MemoryStore,
    INITIAL_CURSOR,
};

// ============================================================================
// Test helpers
// ============================================================================

async fn sqlite_store() -> Arc<SqliteStateStore> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteStateStore::new(
        pool.pool().clone(),
        Cursor::new(INITIAL_CURSOR).unwrap(),
    ))
}

fn id(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_two_pages_then_idempotent_rerun() {
    let source = Arc::new(FakeSource::one_record_per_page(vec![
        invoice("FTMS-1", 100.0),
        invoice("FTMS-2", 200.0),
    ]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source.clone(), destination.clone(), store.clone(), settings(4));

    let first = engine.sync_once().await.unwrap();
    assert_eq!(destination.upsert_count(), 2);
    assert_eq!(first.processed, 2);
    assert_eq!(first.synced, 2);
    assert_eq!(first.pages, 2);

    let cursor = store.get_cursor().await.unwrap();
    assert!(cursor.as_datetime().unwrap() > Cursor::new(INITIAL_CURSOR).unwrap().as_datetime().unwrap());
    assert_eq!(first.cursor_after.as_ref(), Some(&cursor));

    for record in ["FTMS-1", "FTMS-2"] {
        let entry = store.get_ledger_entry(&id(record)).await.unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Synced);
        assert_eq!(entry.destination_id.unwrap().as_str(), format!("OPT-{record}"));
    }

    let second = engine.sync_once().await.unwrap();
    assert_eq!(destination.upsert_count(), 2, "re-run must not upsert");
    assert_eq!(
        (second.processed, second.synced, second.skipped, second.failed),
        (2, 0, 2, 0)
    );
    assert!(second.is_up_to_date());
    assert_eq!(engine.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn test_source_is_crawled_with_persisted_cursor() {
    let source = Arc::new(FakeSource::one_record_per_page(vec![
        invoice("A", 1.0),
        invoice("B", 2.0),
    ]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(
        source.clone(),
        destination,
        store.clone(),
        EngineSettings {
            page_size: 25,
            ..settings(2)
        },
    );

    engine.sync_once().await.unwrap();
    assert_eq!(
        source.calls(),
        vec![
            (INITIAL_CURSOR.to_string(), 1, 25),
            (INITIAL_CURSOR.to_string(), 2, 25),
        ]
    );

    let advanced = store.get_cursor().await.unwrap();
    engine.sync_once().await.unwrap();
    let calls = source.calls();
    assert_eq!(calls[2], (advanced.as_str().to_string(), 1, 25));
}

#[tokio::test]
async fn test_empty_source_still_advances_cursor() {
    let source = Arc::new(FakeSource::new(vec![]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source, destination.clone(), store.clone(), settings(4));

    let summary = engine.sync_once().await.unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.pages, 1);
    assert_eq!(destination.upsert_count(), 0);
    assert_ne!(store.get_cursor().await.unwrap().as_str(), INITIAL_CURSOR);
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
async fn test_synced_entry_with_equal_hash_skips_destination() {
    let record = invoice("FTMS-9", 50.0);
    let document = InvoiceTransformer::new().transform(&record).unwrap();

    let store = sqlite_store().await;
    store
        .put_ledger_entry(&invbridge_core::domain::LedgerEntry::synced(
            id("FTMS-9"),
            content_hash(&document.body),
            invbridge_core::domain::DestinationId::new("OPT-OLD").unwrap(),
        ))
        .await
        .unwrap();

    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(vec![record], false))]));
    let destination = Arc::new(FakeDestination::new());
    let engine = engine(source, destination.clone(), store.clone(), settings(1));

    let summary = engine.sync_once().await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(destination.upsert_count(), 0);

    // The ledger entry is left exactly as it was
    let entry = store.get_ledger_entry(&id("FTMS-9")).await.unwrap().unwrap();
    assert_eq!(entry.destination_id.unwrap().as_str(), "OPT-OLD");
}

#[tokio::test]
async fn test_changed_record_is_upserted_again() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 100.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source.clone(), destination.clone(), store.clone(), settings(1));

    engine.sync_once().await.unwrap();
    let before = store.get_ledger_entry(&id("FTMS-1")).await.unwrap().unwrap();

    source.set_pages(vec![Ok(Page::new(vec![invoice("FTMS-1", 150.0)], false))]);
    let summary = engine.sync_once().await.unwrap();

    assert_eq!(summary.synced, 1);
    assert_eq!(destination.upsert_count(), 2);
    let after = store.get_ledger_entry(&id("FTMS-1")).await.unwrap().unwrap();
    assert_ne!(before.content_hash, after.content_hash);
}

#[tokio::test]
async fn test_numeric_formatting_does_not_trigger_upsert() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 100.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source.clone(), destination.clone(), store, settings(1));
    engine.sync_once().await.unwrap();

    // Same invoice, integers instead of floats and keys in another order
    let reshaped = invbridge_core::domain::RawRecord::new(serde_json::json!({
        "updatedAt": "2025-08-02T00:00:00Z",
        "totals": {"gross": 100, "vat": 0.0, "net": 100},
        "positions": [{"vatRate": "zw.", "netPrice": 100, "quantity": 1.0, "name": "Transport"}],
        "buyer": {"address": "Warszawa", "name": "ACME", "nip": "5250001009"},
        "currency": "PLN",
        "issueDate": "2025-08-01",
        "number": "FV/FTMS-1",
        "id": "FTMS-1"
    }));
    source.set_pages(vec![Ok(Page::new(vec![reshaped], false))]);

    let summary = engine.sync_once().await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(destination.upsert_count(), 1);
}

// ============================================================================
// Per-record failures
// ============================================================================

#[tokio::test]
async fn test_mapping_failure_is_counted_not_fatal() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![
            invoice("FTMS-1", 10.0),
            broken_invoice("FTMS-BAD"),
            invoice("FTMS-3", 30.0),
        ],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source, destination.clone(), store.clone(), settings(2));

    let summary = engine.sync_once().await.unwrap();

    assert_eq!((summary.processed, summary.synced, summary.failed), (3, 2, 1));
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("FTMS-BAD:"), "{:?}", summary.errors);
    assert!(store.get_ledger_entry(&id("FTMS-BAD")).await.unwrap().is_none());
    assert_ne!(store.get_cursor().await.unwrap().as_str(), INITIAL_CURSOR);
}

#[tokio::test]
async fn test_destination_failure_leaves_prior_entry_untouched() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 100.0), invoice("FTMS-2", 100.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source.clone(), destination.clone(), store.clone(), settings(2));
    engine.sync_once().await.unwrap();
    let original = store.get_ledger_entry(&id("FTMS-1")).await.unwrap().unwrap();

    destination.fail_for("FTMS-1");
    source.set_pages(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 999.0), invoice("FTMS-2", 100.0)],
        false,
    ))]);
    let summary = engine.sync_once().await.unwrap();

    assert_eq!((summary.failed, summary.skipped), (1, 1));
    let entry = store.get_ledger_entry(&id("FTMS-1")).await.unwrap().unwrap();
    assert_eq!(entry, original);
}

// ============================================================================
// Fatal failures
// ============================================================================

#[tokio::test]
async fn test_page_two_failure_keeps_cursor() {
    let source = Arc::new(FakeSource::new(vec![
        Ok(Page::new(vec![invoice("FTMS-1", 1.0)], true)),
        Err(SyncError::SourceUnavailable("page 2: HTTP 503".into())),
    ]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source, destination, store.clone(), settings(2));

    let err = engine.sync_once().await.unwrap_err();

    assert!(matches!(err, SyncError::SourceUnavailable(_)));
    assert_eq!(store.get_cursor().await.unwrap().as_str(), INITIAL_CURSOR);
    let entry = store.get_ledger_entry(&id("FTMS-1")).await.unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Synced);
    assert_eq!(engine.phase(), RunPhase::Aborted);
}

#[tokio::test]
async fn test_storage_failure_aborts_run() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 1.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let store = Arc::new(MemoryStore::new());
    store.fail_ledger_writes();
    let engine = engine(source, destination, store.clone(), settings(2));

    let err = engine.sync_once().await.unwrap_err();

    match err {
        SyncError::Storage(msg) => assert!(msg.contains("disk I/O error"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.stored_cursor().is_none());
}

#[tokio::test]
async fn test_aborted_engine_recovers_on_next_run() {
    let source = Arc::new(FakeSource::new(vec![Err(SyncError::SourceUnavailable(
        "down".into(),
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let store = sqlite_store().await;
    let engine = engine(source.clone(), destination, store, settings(2));

    assert!(engine.sync_once().await.is_err());
    assert_eq!(engine.phase(), RunPhase::Aborted);

    source.set_pages(vec![Ok(Page::new(vec![invoice("FTMS-1", 1.0)], false))]);
    let summary = engine.sync_once().await.unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(engine.phase(), RunPhase::Idle);
}

// ============================================================================
// Concurrency, cancellation, timeout
// ============================================================================

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let records = (0..20).map(|i| invoice(&format!("INV-{i}"), i as f64)).collect();
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(records, false))]));
    let gate = Arc::new(Semaphore::new(0));
    let destination = Arc::new(FakeDestination::gated(gate.clone()));
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(engine(source, destination.clone(), store, settings(3)));

    let handle = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.sync_once().await })
    };

    // Every upsert is held at the gate, so the pool fills up and stops at 3
    tokio::time::timeout(Duration::from_secs(5), async {
        while destination.in_flight() < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("pool never filled");
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(destination.in_flight(), 3);
    assert_eq!(destination.upsert_count(), 0);

    gate.add_permits(20);
    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not finish")
        .unwrap()
        .unwrap();

    assert_eq!(summary.synced, 20);
    assert_eq!(destination.upsert_count(), 20);
    assert_eq!(destination.max_in_flight(), 3);
}

#[tokio::test]
async fn test_settings_from_config_drive_paging() {
    let config = ConfigBuilder::new()
        .concurrency(2)
        .page_size(7)
        .run_timeout_secs(Some(60))
        .build();
    let settings = EngineSettings::from_config(&config);
    assert_eq!(settings.run_timeout, Some(Duration::from_secs(60)));

    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 1.0)],
        false,
    ))]));
    let engine = engine(
        source.clone(),
        Arc::new(FakeDestination::new()),
        Arc::new(MemoryStore::new()),
        settings,
    );

    engine.sync_once().await.unwrap();

    assert_eq!(engine.settings().concurrency, 2);
    assert_eq!(source.calls()[0].2, 7);
}

#[tokio::test]
async fn test_cancellation_drops_in_flight_work() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 1.0), invoice("FTMS-2", 2.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::with_delay(Duration::from_secs(60)));
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(engine(source, destination.clone(), store.clone(), settings(2)));

    let cancel = CancellationToken::new();
    let handle = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.sync_until_cancelled(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not stop promptly")
        .unwrap();

    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert_eq!(destination.upsert_count(), 0);
    assert_eq!(store.ledger_len(), 0);
    assert!(store.stored_cursor().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_aborts() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 1.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::with_delay(Duration::from_secs(600)));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(
        source,
        destination,
        store.clone(),
        EngineSettings {
            run_timeout: Some(Duration::from_secs(30)),
            ..settings(1)
        },
    );

    let err = engine.sync_once().await.unwrap_err();

    assert_eq!(err, SyncError::TimedOut(Duration::from_secs(30)));
    assert!(store.stored_cursor().is_none());
}

#[tokio::test]
async fn test_phase_changes_are_observable() {
    let source = Arc::new(FakeSource::new(vec![Ok(Page::new(
        vec![invoice("FTMS-1", 1.0)],
        false,
    ))]));
    let destination = Arc::new(FakeDestination::new());
    let engine = engine(source, destination, Arc::new(MemoryStore::new()), settings(1));

    let mut phases = engine.subscribe_phase();
    assert_eq!(*phases.borrow_and_update(), RunPhase::Idle);

    engine.sync_once().await.unwrap();

    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), RunPhase::Idle);
}
