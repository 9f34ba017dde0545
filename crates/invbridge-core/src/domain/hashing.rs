//! Canonical content hashing
//!
//! The ledger compares documents by hash, so the hash must not depend on
//! field insertion order or on how a number happened to be serialized.
//! Before hashing, every object key is sorted (serde_json's default map is
//! ordered) and every number is rewritten as a fixed-precision decimal
//! string, tagged as `{"$n": "<decimal>"}` so it can never collide with a
//! string holding the same digits. Document keys that start with `$` are
//! escaped to `$$...`.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::newtypes::ContentHash;

/// Decimal places used when canonicalizing numbers
pub const NUMBER_PRECISION: usize = 4;

/// Key of the single-entry object a canonical number is wrapped in
pub const NUMBER_TAG: &str = "$n";

/// Returns `value` with every number replaced by its tagged canonical decimal
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            let mut tagged = Map::with_capacity(1);
            tagged.insert(
                NUMBER_TAG.to_string(),
                Value::String(canonical_number(n.as_f64().unwrap_or_default())),
            );
            Value::Object(tagged)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (escape_key(k), canonicalize(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Document keys starting with `$` get another `$`, keeping the tag reserved
fn escape_key(key: &str) -> String {
    if key.starts_with('$') {
        format!("${key}")
    } else {
        key.to_string()
    }
}

fn canonical_number(n: f64) -> String {
    let rendered = format!("{:.*}", NUMBER_PRECISION, n);
    // -0.0000 and 0.0000 are the same amount
    if rendered.trim_start_matches('-').bytes().all(|b| b == b'0' || b == b'.') {
        format!("{:.*}", NUMBER_PRECISION, 0.0)
    } else {
        rendered
    }
}

/// Hashes a document: canonicalize, serialize compactly, SHA-256, lowercase hex
pub fn content_hash(document: &Value) -> ContentHash {
    let canonical = canonicalize(document);
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    ContentHash::from_digest_hex(format!("{:x}", hasher.finalize()))
}
