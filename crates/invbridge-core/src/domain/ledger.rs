//! Per-record idempotency ledger
//!
//! One [`LedgerEntry`] exists per source record that has ever been written
//! to the destination. The entry remembers the hash of the last document
//! that was successfully upserted, so unchanged records can be skipped.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ContentHash, DestinationId, RecordId};

/// Delivery status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    /// Written before the destination acknowledged the document
    Pending,
    /// The destination holds the document whose hash is stored
    Synced,
    /// The last delivery attempt failed
    Failed,
}

impl LedgerStatus {
    /// All statuses, in display order
    pub const ALL: [LedgerStatus; 3] = [
        LedgerStatus::Pending,
        LedgerStatus::Synced,
        LedgerStatus::Failed,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Synced => "synced",
            LedgerStatus::Failed => "failed",
        }
    }
}

impl Display for LedgerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LedgerStatus::Pending),
            "synced" => Ok(LedgerStatus::Synced),
            "failed" => Ok(LedgerStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Last known delivery state of one source record
///
/// Invariant: `status == Synced` implies `content_hash` is the hash of the
/// document most recently and successfully written to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Source record identifier (ledger key)
    pub id: RecordId,
    /// Hash of the last processed document
    pub content_hash: ContentHash,
    /// Identifier returned by the destination, once known
    pub destination_id: Option<DestinationId>,
    /// Delivery status
    pub status: LedgerStatus,
    /// When this entry was last written
    pub last_updated: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds the entry recorded after a successful upsert
    pub fn synced(id: RecordId, content_hash: ContentHash, destination_id: DestinationId) -> Self {
        Self {
            id,
            content_hash,
            destination_id: Some(destination_id),
            status: LedgerStatus::Synced,
            last_updated: Utc::now(),
        }
    }

    /// True when a document with `hash` is already in the destination
    ///
    /// This is the idempotent-skip check: both the hash and the status
    /// must match.
    pub fn is_current(&self, hash: &ContentHash) -> bool {
        self.status == LedgerStatus::Synced && &self.content_hash == hash
    }
}
