//! Record transformer port

use crate::domain::{DomainError, RawRecord, TransformedDocument};

/// Pure mapping from a source record to a destination document
///
/// Must be deterministic: the same logical record always produces the same
/// document, otherwise the ledger's content hash would never match.
pub trait IRecordTransformer: Send + Sync {
    /// # Errors
    ///
    /// Returns `DomainError::Mapping` for malformed input. The failure is
    /// reported for this record only; the rest of the batch continues.
    fn transform(&self, record: &RawRecord) -> Result<TransformedDocument, DomainError>;
}
