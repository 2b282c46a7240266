//! The fixed set of named collections mirrored by the sync monitor.
//!
//! Each collection lives under its own storage key as a JSON array of
//! records. Reads here are lenient: a missing key, an unreadable store, or a
//! value that is not a JSON array all read as an empty collection.

use serde_json::Value;
use tracing::warn;

use crate::storage::StorageAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedCollection {
    ActionItems,
    SocialPosts,
    Staff,
}

impl NamedCollection {
    pub const ALL: [Self; 3] = [Self::ActionItems, Self::SocialPosts, Self::Staff];

    /// Storage key, also the field name inside a snapshot.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::ActionItems => "actionItems",
            Self::SocialPosts => "socialPosts",
            Self::Staff => "staff",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl std::fmt::Display for NamedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Read a collection as raw JSON records, degrading every failure to empty.
#[must_use]
pub fn read_collection(storage: &dyn StorageAdapter, collection: NamedCollection) -> Vec<Value> {
    let raw = match storage.get(collection.key()) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(collection = collection.key(), error = %e, "collection read failed; treating as empty");
            return Vec::new();
        }
    };
    parse_records(collection, &raw)
}

/// Parse a stored collection value. Anything but a JSON array is empty.
#[must_use]
pub fn parse_records(collection: NamedCollection, raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(records)) => records,
        Ok(other) => {
            warn!(collection = collection.key(), kind = value_kind(&other), "collection is not an array; treating as empty");
            Vec::new()
        }
        Err(e) => {
            warn!(collection = collection.key(), error = %e, "collection is malformed; treating as empty");
            Vec::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "collections_test.rs"]
mod tests;
