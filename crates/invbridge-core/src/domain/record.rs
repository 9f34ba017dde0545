//! Records in flight between source and destination

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::RecordId;

/// An untyped record as returned by the source system
///
/// Owned by exactly one processing task; never shared across tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl RawRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The record's `id` field, when present and non-empty
    ///
    /// Used for logging records that fail before transformation.
    pub fn id(&self) -> Option<RecordId> {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| RecordId::new(id).ok())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// A record mapped to the destination schema, ready to upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedDocument {
    /// Ledger key of the record this document was produced from
    pub source_id: RecordId,
    /// JSON body sent to the destination
    pub body: Value,
}

/// One batch of records from the source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<RawRecord>,
    /// Whether the source reported a further page
    pub has_more: bool,
}

impl Page {
    pub fn new(items: Vec<RawRecord>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
