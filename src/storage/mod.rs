//! Key/value storage seam shared by the sync monitor and collection services.
//!
//! DESIGN
//! ======
//! Storage behaves like a browser origin's local storage: string keys,
//! string values, shared by every context of the origin, unversioned.
//! Callers never touch a global; they receive an `Arc<dyn StorageAdapter>`
//! so tests can swap in a fake.
//!
//! A write that changes a value is announced to the *other* contexts of the
//! same origin through a `StorageEvent`. A context never observes its own
//! writes on its `subscribe()` stream.

pub mod origin;

use tokio::sync::broadcast;
use uuid::Uuid;

pub use origin::{ContextStorage, OriginStore};

/// Default quota for one origin, matching the usual browser local storage limit.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is disabled")]
    Disabled,
    #[error("storage quota exceeded ({needed} bytes needed, quota is {quota})")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(String),
}

impl crate::ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Disabled => "E_STORAGE_DISABLED",
            Self::QuotaExceeded { .. } => "E_STORAGE_QUOTA",
            Self::Io(_) => "E_STORAGE_IO",
            Self::Corrupt(_) => "E_STORAGE_CORRUPT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Identity of one context (tab, window, process) sharing an origin store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Change notification for one key. `new_value` is `None` for removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub source: ContextId,
}

/// Stream of change notifications produced by other contexts.
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    own: Option<ContextId>,
}

impl StorageEvents {
    /// Wrap a broadcast receiver. Events whose source is `own` are skipped.
    #[must_use]
    pub fn new(rx: broadcast::Receiver<StorageEvent>, own: Option<ContextId>) -> Self {
        Self { rx, own }
    }

    /// Wait for the next foreign event.
    ///
    /// # Errors
    ///
    /// Returns `Lagged` when the receiver fell behind and dropped events, and
    /// `Closed` once the origin store is gone.
    pub async fn recv(&mut self) -> Result<StorageEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if Some(event.source) != self.own {
                return Ok(event);
            }
        }
    }
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Synchronous key/value storage with change subscription.
pub trait StorageAdapter: Send + Sync {
    /// Read a key. `Ok(None)` when the key was never written.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the store is disabled, full, or unwritable.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the store is disabled or unwritable.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to writes made by other contexts.
    fn subscribe(&self) -> StorageEvents;

    /// True when calls do synchronous file I/O and should stay off async workers.
    fn is_blocking(&self) -> bool {
        false
    }
}
