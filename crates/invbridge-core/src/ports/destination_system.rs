//! Destination system port (driven/secondary port)

use crate::domain::{DestinationId, SyncError, TransformedDocument};

/// Idempotent writer of transformed documents
///
/// Implementations must merge on the document key: the engine may repeat an
/// upsert whose earlier response was lost even though the write was applied.
#[async_trait::async_trait]
pub trait IDestinationSystem: Send + Sync {
    /// Creates or updates `document` and returns the destination's identifier
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DestinationUnavailable` when retries are exhausted,
    /// the response status is not retryable, or the response lacks an ID.
    async fn upsert(&self, document: &TransformedDocument) -> Result<DestinationId, SyncError>;
}
