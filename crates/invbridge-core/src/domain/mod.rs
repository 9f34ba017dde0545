//! Domain entities and business logic
//!
//! This module contains the core domain types for InvBridge:
//! - Newtypes for type-safe identifiers and the sync cursor
//! - Ledger entries used for idempotent skipping
//! - Raw records, transformed documents and pages
//! - Run lifecycle (phase state machine and summary)
//! - Canonical content hashing
//! - Domain-specific error types

pub mod errors;
pub mod hashing;
pub mod ledger;
pub mod newtypes;
pub mod record;
pub mod run;

// Re-export commonly used types
pub use errors::{DomainError, SyncError};
pub use hashing::content_hash;
pub use ledger::{LedgerEntry, LedgerStatus};
pub use newtypes::*;
pub use record::{Page, RawRecord, TransformedDocument};
pub use run::{RecordOutcome, RunPhase, RunSummary};
