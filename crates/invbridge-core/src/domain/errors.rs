//! Domain error types
//!
//! This module defines error types specific to domain operations
//! (identifier validation, record mapping) and the error taxonomy
//! shared by the synchronization ports.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid source record identifier
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),

    /// Invalid run identifier
    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    /// Invalid destination identifier
    #[error("Invalid destination ID: {0}")]
    InvalidDestinationId(String),

    /// Invalid content hash format (expected 64 lowercase hex characters)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid cursor value
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A raw record could not be mapped to the destination schema
    #[error("Mapping failed: {0}")]
    Mapping(String),

    /// Unknown ledger status string
    #[error("Unknown ledger status: {0}")]
    UnknownStatus(String),
}

/// Errors surfaced by the synchronization ports and the orchestrator
///
/// Transient network failures never appear here: they are retried inside
/// the HTTP adapters and only escape as `SourceUnavailable` or
/// `DestinationUnavailable` once the retry policy gives up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The source system could not be read (retries exhausted or non-retryable failure)
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The destination system rejected or never acknowledged a write
    #[error("Destination unavailable: {0}")]
    DestinationUnavailable(String),

    /// A record could not be transformed
    #[error(transparent)]
    Mapping(#[from] DomainError),

    /// The state store failed; the run cannot continue safely
    #[error("Storage error: {0}")]
    Storage(String),

    /// The run was cancelled before completion
    #[error("Sync run cancelled")]
    Cancelled,

    /// The run exceeded its configured time limit
    #[error("Sync run timed out after {0:?}")]
    TimedOut(Duration),
}

impl SyncError {
    /// Wraps a state store failure, keeping the full error chain in the message
    pub fn storage(err: anyhow::Error) -> Self {
        SyncError::Storage(format!("{err:#}"))
    }

    /// Whether this error ends the whole run rather than a single record
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_)
                | SyncError::Storage(_)
                | SyncError::Cancelled
                | SyncError::TimedOut(_)
        )
    }
}
