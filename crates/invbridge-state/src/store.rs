//! SQLite implementation of IStateStore
//!
//! ## Type Mapping
//!
//! | Domain Type     | Table.column             | Strategy                          |
//! |-----------------|--------------------------|-----------------------------------|
//! | Cursor          | state.value (`since_ts`) | String via `.as_str()` / `Cursor::new()` |
//! | RecordId        | invoices.id              | String via `.as_str()` / `RecordId::new()` |
//! | ContentHash     | invoices.payload_hash    | Hex string / `ContentHash::new()` |
//! | DestinationId   | invoices.external_id     | Nullable string                   |
//! | LedgerStatus    | invoices.status          | `as_str()` / `FromStr`            |
//! | DateTime<Utc>   | invoices.updated_at      | RFC 3339 via `to_rfc3339()`       |
//!
//! `updated_at` is also read back from REAL unix seconds, the layout older
//! databases were written with. Columns that fail to decode surface as
//! [`StateError::CorruptRow`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, SqlitePool, Type};

use invbridge_core::domain::{
    ContentHash, Cursor, DestinationId, LedgerEntry, LedgerStatus, RecordId,
};
use invbridge_core::ports::IStateStore;

use crate::StateError;

/// Key of the cursor row in the `state` table
pub const CURSOR_KEY: &str = "since_ts";

/// SQLite-backed cursor and ledger
///
/// Every write is a single autocommitted statement, so it is durable once
/// the call returns.
pub struct SqliteStateStore {
    pool: SqlitePool,
    default_cursor: Cursor,
}

impl SqliteStateStore {
    /// Creates a store; `default_cursor` is returned until a cursor is saved
    pub fn new(pool: SqlitePool, default_cursor: Cursor) -> Self {
        Self {
            pool,
            default_cursor,
        }
    }

    /// The cursor returned when nothing has been persisted
    pub fn default_cursor(&self) -> &Cursor {
        &self.default_cursor
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from its stored string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StateError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by hand or by older tools may lack a timezone
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StateError::CorruptRow(format!("Failed to parse datetime '{}': {}", s, e)))
}

/// Decode one column, reporting a type mismatch or NULL as a corrupt row
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StateError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StateError::CorruptRow(format!("column '{}': {}", name, e)))
}

/// Read `updated_at` stored either as text or as REAL unix seconds
fn updated_at_from_row(row: &SqliteRow) -> Result<DateTime<Utc>, StateError> {
    if let Ok(text) = row.try_get::<String, _>("updated_at") {
        return parse_datetime(&text);
    }

    let secs: f64 = column(row, "updated_at")?;
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).ok_or_else(|| {
        StateError::CorruptRow(format!("updated_at out of range: {}", secs))
    })
}

/// Reconstruct a LedgerEntry from an `invoices` row
fn ledger_entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, StateError> {
    let id_str: String = column(row, "id")?;
    let hash_str: String = column(row, "payload_hash")?;
    let external_id: Option<String> = column(row, "external_id")?;
    let status_str: String = column(row, "status")?;

    let id = RecordId::new(id_str)
        .map_err(|e| StateError::CorruptRow(format!("invoices.id: {}", e)))?;
    let content_hash = ContentHash::new(hash_str)
        .map_err(|e| StateError::CorruptRow(format!("invoices.payload_hash for {}: {}", id, e)))?;
    let destination_id = match external_id {
        Some(ext) if !ext.is_empty() => Some(
            DestinationId::new(ext)
                .map_err(|e| StateError::CorruptRow(format!("invoices.external_id: {}", e)))?,
        ),
        _ => None,
    };
    let status: LedgerStatus = status_str
        .parse()
        .map_err(|e| StateError::CorruptRow(format!("invoices.status for {}: {}", id, e)))?;
    let last_updated = updated_at_from_row(row)?;

    Ok(LedgerEntry {
        id,
        content_hash,
        destination_id,
        status,
        last_updated,
    })
}

// ============================================================================
// IStateStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateStore for SqliteStateStore {
    async fn get_cursor(&self) -> anyhow::Result<Cursor> {
        let row = sqlx::query("SELECT value FROM state WHERE key = ?")
            .bind(CURSOR_KEY)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let value: String = column(&r, "value")?;
                let cursor = Cursor::new(value)
                    .map_err(|e| StateError::CorruptRow(format!("state.{}: {}", CURSOR_KEY, e)))?;
                Ok(cursor)
            }
            None => Ok(self.default_cursor.clone()),
        }
    }

    async fn set_cursor(&self, cursor: &Cursor) -> anyhow::Result<()> {
        sqlx::query("INSERT OR REPLACE INTO state (key, value) VALUES (?, ?)")
            .bind(CURSOR_KEY)
            .bind(cursor.as_str())
            .execute(&self.pool)
            .await?;

        tracing::debug!(cursor = %cursor, "Saved cursor");
        Ok(())
    }

    async fn get_ledger_entry(&self, id: &RecordId) -> anyhow::Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            "SELECT id, payload_hash, external_id, status, updated_at \
             FROM invoices WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(ledger_entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn put_ledger_entry(&self, entry: &LedgerEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO invoices \
             (id, payload_hash, external_id, status, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.id.as_str())
        .bind(entry.content_hash.as_str())
        .bind(entry.destination_id.as_ref().map(|d| d.as_str()))
        .bind(entry.status.as_str())
        .bind(entry.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(record_id = %entry.id, status = %entry.status, "Saved ledger entry");
        Ok(())
    }

    async fn count_ledger_by_status(&self) -> anyhow::Result<HashMap<String, u64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) as count FROM invoices GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = HashMap::new();
        for row in &rows {
            let status_str: String = column(row, "status")?;
            let count: i64 = column(row, "count")?;
            let status: LedgerStatus = status_str
                .parse()
                .map_err(|e| StateError::CorruptRow(format!("invoices.status: {}", e)))?;
            counts.insert(status.as_str().to_string(), count as u64);
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_rfc3339() {
        let dt = parse_datetime("2025-08-01T12:30:05+00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-01T12:30:05+00:00");
    }

    #[test]
    fn test_parse_datetime_naive_fallbacks() {
        assert!(parse_datetime("2025-08-01 12:30:05").is_ok());
        assert!(parse_datetime("2025-08-01T12:30:05").is_ok());
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        let err = parse_datetime("yesterday").unwrap_err();
        assert!(matches!(err, StateError::CorruptRow(_)));
    }
}
