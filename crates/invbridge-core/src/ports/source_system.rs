//! Source system port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Returns [`SyncError`] rather than `anyhow::Result`: the orchestrator
//!   must tell a fatal `SourceUnavailable` apart from everything else.
//! - Adapters own their retry loop. By the time an error reaches the caller
//!   the retry budget is spent or the failure was not retryable.
//! - Each call is independent; implementations keep no state across pages.

use crate::domain::{Cursor, Page, SyncError};

/// Paginated reader of records updated since a cursor
#[async_trait::async_trait]
pub trait ISourceSystem: Send + Sync {
    /// Fetches one page of records updated after `since`
    ///
    /// # Arguments
    /// * `since` - Cursor marking the lower bound of the update window
    /// * `page` - 1-based page number
    /// * `page_size` - Maximum number of records per page
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SourceUnavailable` when retries are exhausted,
    /// the response status is not retryable, or the body is malformed.
    async fn fetch_page(&self, since: &Cursor, page: u32, page_size: u32)
        -> Result<Page, SyncError>;
}
