//! Collection service — list/create/update/delete for dashboard records.
//!
//! DESIGN
//! ======
//! Every write reads the whole collection from storage, applies one change,
//! and writes the whole collection back. Last writer wins; there is no
//! merge with concurrent writers in other contexts. Records already in
//! storage that do not decode as `T` are carried through untouched.
//!
//! After a successful write the context's own model is patched and the
//! monitor captures a new snapshot, so the write never shows up as
//! divergence.
//!
//! ERROR HANDLING
//! ==============
//! Unlike the monitor, this service surfaces storage failures: a failed
//! write is the "failed to save" the user needs to see. The model and the
//! snapshot are only touched after storage accepted the write.

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::access::{AccessError, Role, authorize};
use crate::collections::{NamedCollection, read_collection};
use crate::model::{Record, RecordError};
use crate::state::AppState;
use crate::storage::StorageError;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("invalid {collection} record: {source}")]
    Invalid {
        collection: NamedCollection,
        #[source]
        source: RecordError,
    },
    #[error("{collection} record not found: {id}")]
    NotFound { collection: NamedCollection, id: String },
    #[error("{collection} record already exists: {id}")]
    Duplicate { collection: NamedCollection, id: String },
    #[error("failed to save {collection}: {source}")]
    Storage {
        collection: NamedCollection,
        #[source]
        source: StorageError,
    },
    #[error("failed to encode {collection}: {source}")]
    Encode {
        collection: NamedCollection,
        #[source]
        source: serde_json::Error,
    },
}

impl crate::ErrorCode for CollectionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Invalid { .. } => "E_INVALID",
            Self::NotFound { .. } => "E_NOT_FOUND",
            Self::Duplicate { .. } => "E_DUPLICATE",
            Self::Storage { .. } => "E_SAVE_FAILED",
            Self::Encode { .. } => "E_ENCODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Storage { source, .. } if crate::ErrorCode::retryable(source))
    }
}

// =============================================================================
// READ
// =============================================================================

/// Records as the context's views currently show them.
///
/// # Errors
///
/// Returns `Forbidden` unless `user` is at least a viewer.
pub fn list<T: Record>(state: &AppState, user: &str) -> Result<Vec<T>, CollectionError> {
    authorize(state.access.as_ref(), user, Role::Viewer)?;
    Ok(state.model().records::<T>().to_vec())
}

/// Look up one record in the context's model.
///
/// # Errors
///
/// Returns `Forbidden` unless `user` is at least a viewer, and `NotFound`
/// when no record has `id`.
pub fn get<T: Record>(state: &AppState, user: &str, id: &str) -> Result<T, CollectionError> {
    authorize(state.access.as_ref(), user, Role::Viewer)?;
    state
        .model()
        .records::<T>()
        .iter()
        .find(|r| r.id() == id)
        .cloned()
        .ok_or_else(|| CollectionError::NotFound { collection: T::COLLECTION, id: id.to_owned() })
}

// =============================================================================
// WRITE
// =============================================================================

/// Add a record. A blank id is replaced with a fresh UUID.
///
/// # Errors
///
/// Returns `Forbidden` unless `user` is at least an editor, `Invalid` when
/// validation fails, `Duplicate` when the id is taken, and `Storage` when
/// the collection cannot be saved.
pub fn create<T: Record>(state: &AppState, user: &str, mut record: T) -> Result<T, CollectionError> {
    authorize(state.access.as_ref(), user, Role::Editor)?;
    validate(&record)?;
    if record.id().trim().is_empty() {
        record.set_id(Uuid::new_v4().to_string());
    }

    let mut stored = read_collection(state.storage.as_ref(), T::COLLECTION);
    if position_of(&stored, record.id()).is_some() {
        return Err(CollectionError::Duplicate { collection: T::COLLECTION, id: record.id().to_owned() });
    }
    stored.push(encode(&record)?);
    save::<T>(state, &stored)?;

    T::in_model_mut(&mut state.model_mut()).push(record.clone());
    state.monitor.sync_data();
    info!(collection = T::COLLECTION.key(), id = record.id(), user, "record created");
    Ok(record)
}

/// Replace the record with the same id.
///
/// # Errors
///
/// Returns `Forbidden` unless `user` is at least an editor, `Invalid` when
/// validation fails, `NotFound` when storage has no such id, and `Storage`
/// when the collection cannot be saved.
pub fn update<T: Record>(state: &AppState, user: &str, record: T) -> Result<T, CollectionError> {
    authorize(state.access.as_ref(), user, Role::Editor)?;
    validate(&record)?;

    let mut stored = read_collection(state.storage.as_ref(), T::COLLECTION);
    let Some(index) = position_of(&stored, record.id()) else {
        return Err(CollectionError::NotFound { collection: T::COLLECTION, id: record.id().to_owned() });
    };
    stored[index] = encode(&record)?;
    save::<T>(state, &stored)?;

    {
        let mut model = state.model_mut();
        let records = T::in_model_mut(&mut model);
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record.clone(),
            // EDGE: created by another context after this model was loaded.
            None => records.push(record.clone()),
        }
    }
    state.monitor.sync_data();
    info!(collection = T::COLLECTION.key(), id = record.id(), user, "record updated");
    Ok(record)
}

/// Remove the record with `id`.
///
/// # Errors
///
/// Returns `Forbidden` unless `user` is an admin, `NotFound` when storage
/// has no such id, and `Storage` when the collection cannot be saved.
pub fn delete<T: Record>(state: &AppState, user: &str, id: &str) -> Result<(), CollectionError> {
    authorize(state.access.as_ref(), user, Role::Admin)?;

    let mut stored = read_collection(state.storage.as_ref(), T::COLLECTION);
    let Some(index) = position_of(&stored, id) else {
        return Err(CollectionError::NotFound { collection: T::COLLECTION, id: id.to_owned() });
    };
    stored.remove(index);
    save::<T>(state, &stored)?;

    T::in_model_mut(&mut state.model_mut()).retain(|r| r.id() != id);
    state.monitor.sync_data();
    info!(collection = T::COLLECTION.key(), id, user, "record deleted");
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn validate<T: Record>(record: &T) -> Result<(), CollectionError> {
    record
        .validate()
        .map_err(|source| CollectionError::Invalid { collection: T::COLLECTION, source })
}

fn encode<T: Record>(record: &T) -> Result<Value, CollectionError> {
    serde_json::to_value(record).map_err(|source| CollectionError::Encode { collection: T::COLLECTION, source })
}

fn position_of(stored: &[Value], id: &str) -> Option<usize> {
    stored
        .iter()
        .position(|v| v.get("id").and_then(Value::as_str) == Some(id))
}

fn save<T: Record>(state: &AppState, stored: &[Value]) -> Result<(), CollectionError> {
    let encoded = serde_json::to_string(stored)
        .map_err(|source| CollectionError::Encode { collection: T::COLLECTION, source })?;
    state
        .storage
        .set(T::COLLECTION.key(), &encoded)
        .map_err(|source| CollectionError::Storage { collection: T::COLLECTION, source })
}

#[cfg(test)]
#[path = "collection_test.rs"]
mod tests;
