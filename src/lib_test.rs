use super::*;
use crate::collections::NamedCollection;
use crate::services::collection::CollectionError;
use crate::storage::StorageError;

#[test]
fn render_error_flags_retryable_failures() {
    let err = CollectionError::Storage {
        collection: NamedCollection::Staff,
        source: StorageError::Io(std::io::Error::other("disk busy")),
    };
    assert!(err.retryable());
    assert_eq!(render_error(&err), "error[E_SAVE_FAILED] (retryable): failed to save staff: storage i/o failed: disk busy");
}

#[test]
fn render_error_plain_for_permanent_failures() {
    let err = CollectionError::Storage { collection: NamedCollection::Staff, source: StorageError::Disabled };
    assert!(!err.retryable());
    assert_eq!(render_error(&err), "error[E_SAVE_FAILED]: failed to save staff: storage is disabled");
}
