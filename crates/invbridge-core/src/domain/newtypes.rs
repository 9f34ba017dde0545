//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// RunId
// ============================================================================

/// Identifier for a single synchronization run, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidRunId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// String-based identifiers
// ============================================================================

/// Identifier of a record in the source system (e.g. `FTMS-0001`)
///
/// The ledger is keyed by this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Creates a RecordId, rejecting empty or whitespace-only values
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidRecordId(
                "record ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Identifier assigned by the destination system to an upserted document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DestinationId(String);

impl DestinationId {
    /// Creates a DestinationId, rejecting empty values
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidDestinationId(
                "destination ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DestinationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DestinationId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DestinationId> for String {
    fn from(id: DestinationId) -> Self {
        id.0
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// SHA-256 digest of a canonicalized document, as 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded SHA-256 digest
    pub const HEX_LEN: usize = 64;

    /// Creates a ContentHash after validating its format
    pub fn new(hex: impl Into<String>) -> Result<Self, DomainError> {
        let hex = hex.into();
        let valid = hex.len() == Self::HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(DomainError::InvalidHash(format!(
                "expected {} lowercase hex characters, got '{}'",
                Self::HEX_LEN,
                hex
            )));
        }
        Ok(Self(hex))
    }

    /// Wraps the output of `format!("{:x}", Sha256::finalize())`
    pub(crate) fn from_digest_hex(hex: String) -> Self {
        debug_assert_eq!(hex.len(), Self::HEX_LEN);
        Self(hex)
    }

    /// Returns the hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Watermark marking "fetch records updated after this point"
///
/// The value is opaque to the source system, but the engine writes it as
/// an RFC 3339 UTC timestamp with second precision (`2025-01-01T00:00:00Z`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(String);

impl Cursor {
    /// Creates a Cursor, rejecting empty values
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidCursor(
                "cursor cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Formats a timestamp the way the engine persists cursors
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Returns the raw cursor string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the cursor as a timestamp, if it is one
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Returns the cursor to persist after a successful run
    ///
    /// Never moves backwards: if both values are timestamps and `candidate`
    /// is older than `self`, `self` is kept. Non-timestamp cursors cannot be
    /// compared and are replaced by `candidate`.
    #[must_use]
    pub fn advance_to(&self, candidate: Cursor) -> Cursor {
        match (self.as_datetime(), candidate.as_datetime()) {
            (Some(current), Some(next)) if next < current => self.clone(),
            _ => candidate,
        }
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cursor {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}
