//! InvBridge State - Durable sync progress
//!
//! SQLite-backed storage for:
//! - The incremental cursor (`since_ts`)
//! - The per-record idempotency ledger
//!
//! ## Architecture
//!
//! This crate implements the `IStateStore` port from `invbridge-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteStateStore`] - `IStateStore` implementation
//! - [`StateError`] - Error types for storage operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use invbridge_core::domain::Cursor;
//! use invbridge_state::{DatabasePool, SqliteStateStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/invbridge/sync_state.sqlite")).await?;
//! let store = SqliteStateStore::new(pool.pool().clone(), Cursor::new("2025-01-01T00:00:00Z")?);
//! // Use store as IStateStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteStateStore;

/// Errors that can occur during state storage operations
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Failed to open or create the database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be turned back into a domain type
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for StateError {
    fn from(e: sqlx::Error) -> Self {
        StateError::QueryFailed(e.to_string())
    }
}
