// Document Store - the read interface the metrics engine queries
//
// Every engine component receives an `Arc<dyn DocumentStore>` at construction.
// Two implementations:
// - MemoryStore: in-process collections (tests, fixtures)
// - SqliteStore: JSON documents persisted in SQLite (CLI and API server)

pub mod filter;
pub mod memory;
pub mod sqlite;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use filter::Filter;
pub use memory::MemoryStore;
pub use sqlite::{ImportSummary, SqliteStore};

/// A stored record, always a JSON object.
pub type Document = Value;

/// Collection names of the platform's persisted schema.
pub mod collections {
    pub const MERCHANTS: &str = "merchants";
    pub const PLANS: &str = "planes";
    pub const MEMBERS: &str = "clientes";
    pub const RECEIPTS: &str = "boletas";

    pub const ALL: [&str; 4] = [MERCHANTS, PLANS, MEMBERS, RECEIPTS];
}

/// Read-only access to document collections.
pub trait DocumentStore: Send + Sync {
    /// All documents in `collection` matching `filter`, in storage order.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(collection, filter)?.into_iter().next())
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        Ok(self.find(collection, filter)?.len() as u64)
    }
}

/// Decode a stored document into an entity type.
pub fn decode<T: DeserializeOwned>(collection: &str, doc: Document) -> crate::error::Result<T> {
    serde_json::from_value(doc).map_err(|e| crate::error::MetricsError::malformed(collection, e))
}

// ============================================================================
// DUMPS
// ============================================================================

/// Parse a snapshot dump: a JSON object mapping collection name to an array
/// of documents. Extended JSON wrappers are flattened.
pub fn parse_dump(json: &str) -> Result<Vec<(String, Vec<Document>)>> {
    let root: Value = serde_json::from_str(json).context("Failed to parse snapshot dump")?;

    let Value::Object(collections) = root else {
        bail!("snapshot dump must be a JSON object keyed by collection name");
    };

    let mut parsed = Vec::with_capacity(collections.len());
    for (name, docs) in collections {
        let Value::Array(docs) = docs else {
            bail!("collection '{}' in snapshot dump must be an array", name);
        };

        let mut flattened = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = flatten_extended_json(doc);
            if !doc.is_object() {
                bail!("collection '{}' contains a non-object document", name);
            }
            flattened.push(doc);
        }
        parsed.push((name, flattened));
    }

    Ok(parsed)
}

/// Replace Mongo extended JSON wrappers with plain values:
/// `{"$oid": "x"}` -> `"x"`, `{"$date": "..."}` -> `"..."`,
/// `{"$date": {"$numberLong": "ms"}}` -> RFC 3339 string,
/// `{"$numberLong": "n"}` / `{"$numberInt": "n"}` / `{"$numberDouble": "f"}` -> number.
pub fn flatten_extended_json(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(flatten_extended_json).collect()),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    if let Some(plain) = unwrap_wrapper(key, inner) {
                        return plain;
                    }
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, flatten_extended_json(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        other => other,
    }
}

fn unwrap_wrapper(key: &str, inner: &Value) -> Option<Value> {
    match (key, inner) {
        ("$oid", Value::String(id)) => Some(Value::String(id.clone())),
        ("$date", Value::String(ts)) => Some(Value::String(ts.clone())),
        ("$date", Value::Object(_)) => {
            let millis = flatten_extended_json(inner.clone()).as_i64()?;
            let ts = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)?;
            Some(Value::String(ts.to_rfc3339()))
        }
        ("$numberLong", Value::String(n)) | ("$numberInt", Value::String(n)) => {
            n.parse::<i64>().ok().map(Value::from)
        }
        ("$numberDouble", Value::String(n)) => n.parse::<f64>().ok().map(Value::from),
        _ => None,
    }
}
