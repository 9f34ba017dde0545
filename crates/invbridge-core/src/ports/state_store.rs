//! State store port (driven/secondary port)
//!
//! This module defines the interface for persisting synchronization
//! progress: a single cursor value and the per-record ledger.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification. The orchestrator turns
//!   any of them into a fatal `SyncError::Storage`.
//! - Every write must be durable before the method returns.
//! - Ledger writes are keyed by record ID; concurrent writers on distinct
//!   IDs never contend.

use std::collections::HashMap;

use crate::domain::{Cursor, LedgerEntry, RecordId};

/// Durable cursor and ledger storage
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    // --- Cursor ---

    /// Returns the persisted cursor, or the store's configured default if none
    /// has been written yet
    async fn get_cursor(&self) -> anyhow::Result<Cursor>;

    /// Atomically replaces the persisted cursor
    async fn set_cursor(&self, cursor: &Cursor) -> anyhow::Result<()>;

    // --- Ledger ---

    /// Looks up the ledger entry for a source record
    async fn get_ledger_entry(&self, id: &RecordId) -> anyhow::Result<Option<LedgerEntry>>;

    /// Inserts or replaces the ledger entry keyed by `entry.id`
    async fn put_ledger_entry(&self, entry: &LedgerEntry) -> anyhow::Result<()>;

    /// Counts ledger entries grouped by status name
    async fn count_ledger_by_status(&self) -> anyhow::Result<HashMap<String, u64>>;
}
