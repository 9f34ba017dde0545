//! Database connection pool management
//!
//! Wraps SQLx's SqlitePool with:
//! - Automatic directory creation for the database file
//! - WAL journal mode with `synchronous = FULL`, so a committed cursor or
//!   ledger write survives a crash
//! - Schema migration on open
//! - In-memory mode for testing

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::StateError;

/// Pool of SQLite connections holding the cursor and ledger
///
/// - 5 max connections for file-based databases
/// - 1 connection for in-memory databases (each connection is its own database)
/// - 5-second busy timeout to absorb write contention between workers
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path` and migrates it
    ///
    /// # Errors
    ///
    /// Returns `StateError::ConnectionFailed` if the file or its directory
    /// cannot be created or opened, or `StateError::MigrationFailed` if the
    /// schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, StateError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StateError::ConnectionFailed(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                StateError::ConnectionFailed(format!(
                    "Failed to open database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "State database opened");

        Ok(Self { pool })
    }

    /// Creates an in-memory database for tests
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, StateError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                StateError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory state database initialized");

        Ok(Self { pool })
    }

    /// Returns the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes all connections, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), StateError> {
        let migration_sql = include_str!("migrations/20250801_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                StateError::MigrationFailed(format!("Failed to run initial migration: {}", e))
            })?;

        tracing::debug!("State migrations completed");
        Ok(())
    }
}
