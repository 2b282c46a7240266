//! Point-in-time copy of every named collection.
//!
//! Stored under `SNAPSHOT_KEY` as
//! `{"actionItems":[...],"socialPosts":[...],"staff":[...],"lastUpdated":"<RFC 3339>"}`.
//! A snapshot is never patched in place; every capture writes a whole new one.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::collections::NamedCollection;

/// Well-known storage key holding the last captured snapshot.
pub const SNAPSHOT_KEY: &str = "syncSnapshot";

const LAST_UPDATED_FIELD: &str = "lastUpdated";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot is not a JSON object")]
    NotAnObject,
    #[error("snapshot timestamp could not be formatted: {0}")]
    Timestamp(#[from] time::error::Format),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    collections: BTreeMap<NamedCollection, Vec<Value>>,
    last_updated: OffsetDateTime,
}

impl SyncSnapshot {
    /// Build a snapshot. Collections absent from `collections` are stored empty.
    #[must_use]
    pub fn new(mut collections: BTreeMap<NamedCollection, Vec<Value>>, last_updated: OffsetDateTime) -> Self {
        for collection in NamedCollection::ALL {
            collections.entry(collection).or_default();
        }
        Self { collections, last_updated }
    }

    #[must_use]
    pub fn collection(&self, collection: NamedCollection) -> &[Value] {
        self.collections.get(&collection).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn last_updated(&self) -> OffsetDateTime {
        self.last_updated
    }

    /// Canonical serialized form of one collection, used for divergence checks.
    #[must_use]
    pub fn serialized(&self, collection: NamedCollection) -> String {
        serialize_records(self.collection(collection))
    }

    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Timestamp` if the capture time cannot be
    /// rendered as RFC 3339 (years outside 0..=9999).
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        let mut object = Map::new();
        for collection in NamedCollection::ALL {
            object.insert(collection.key().to_owned(), Value::Array(self.collection(collection).to_vec()));
        }
        object.insert(LAST_UPDATED_FIELD.to_owned(), Value::String(self.last_updated.format(&Rfc3339)?));
        Ok(serde_json::to_string(&Value::Object(object))?)
    }

    /// Decode a stored snapshot.
    ///
    /// Individual fields are read leniently: a collection that is missing or
    /// not an array reads as empty, and an unreadable `lastUpdated` reads as
    /// the Unix epoch.
    ///
    /// # Errors
    ///
    /// Fails only when `raw` is not JSON or not a JSON object.
    pub fn from_stored(raw: &str) -> Result<Self, SnapshotError> {
        let Value::Object(mut object) = serde_json::from_str::<Value>(raw)? else {
            return Err(SnapshotError::NotAnObject);
        };

        let mut collections = BTreeMap::new();
        for collection in NamedCollection::ALL {
            let records = match object.remove(collection.key()) {
                Some(Value::Array(records)) => records,
                None => Vec::new(),
                Some(_) => {
                    warn!(collection = collection.key(), "snapshot field is not an array; treating as empty");
                    Vec::new()
                }
            };
            collections.insert(collection, records);
        }

        let last_updated = object
            .get(LAST_UPDATED_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        Ok(Self { collections, last_updated })
    }
}

/// Canonical serialized form of a record sequence.
#[must_use]
pub fn serialize_records(records: &[Value]) -> String {
    serde_json::to_string(records).unwrap_or_default()
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
