//! Origin-wide storage and per-context handles.
//!
//! DESIGN
//! ======
//! `OriginStore` is cheap to clone; all clones share one backend, one quota
//! and one broadcast channel. Each `ContextStorage` handed out by
//! `context()` stamps its writes with its own `ContextId`, which is how the
//! change stream filters out a context's own writes.
//!
//! The file backend re-reads the file on every access. Two processes
//! pointing at the same file therefore see each other's writes, although
//! only in-process contexts receive change events.
//!
//! ERROR HANDLING
//! ==============
//! A write that would exceed the quota is rejected before anything is
//! persisted. File writes go through a temporary sibling and a rename so a
//! crash mid-write never leaves a truncated store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use super::{ContextId, StorageAdapter, StorageError, StorageEvent, StorageEvents};

const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// BACKEND
// =============================================================================

enum Backend {
    Memory(HashMap<String, String>),
    File(PathBuf),
}

impl Backend {
    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match self {
            Self::Memory(map) => Ok(map.clone()),
            Self::File(path) => load_file(path),
        }
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Memory(map) => Ok(map.get(key).cloned()),
            Self::File(path) => Ok(load_file(path)?.remove(key)),
        }
    }

    fn store(&mut self, entries: HashMap<String, String>) -> Result<(), StorageError> {
        match self {
            Self::Memory(map) => {
                *map = entries;
                Ok(())
            }
            Self::File(path) => write_file(path, &entries),
        }
    }
}

fn load_file(path: &Path) -> Result<HashMap<String, String>, StorageError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))
}

fn write_file(path: &Path, entries: &HashMap<String, String>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let encoded = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Corrupt(e.to_string()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, encoded)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn used_bytes(entries: &HashMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

// =============================================================================
// ORIGIN STORE
// =============================================================================

struct OriginInner {
    backend: Mutex<Backend>,
    events: broadcast::Sender<StorageEvent>,
    quota_bytes: usize,
    file_backed: bool,
    disabled: AtomicBool,
}

/// Storage shared by every context of one origin.
#[derive(Clone)]
pub struct OriginStore {
    inner: Arc<OriginInner>,
}

impl OriginStore {
    /// Volatile store; contents vanish with the last clone.
    #[must_use]
    pub fn in_memory(quota_bytes: usize) -> Self {
        Self::with_backend(Backend::Memory(HashMap::new()), quota_bytes)
    }

    /// Store persisted as a JSON object in `path`. The file is created on first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, quota_bytes: usize) -> Self {
        Self::with_backend(Backend::File(path.into()), quota_bytes)
    }

    fn with_backend(backend: Backend, quota_bytes: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let file_backed = matches!(backend, Backend::File(_));
        Self {
            inner: Arc::new(OriginInner {
                backend: Mutex::new(backend),
                events,
                quota_bytes,
                file_backed,
                disabled: AtomicBool::new(false),
            }),
        }
    }

    /// Hand out a handle for a new context.
    #[must_use]
    pub fn context(&self) -> ContextStorage {
        ContextStorage { origin: self.clone(), id: ContextId::new() }
    }

    /// Simulate storage being switched off (privacy mode, policy).
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.disabled.store(disabled, Ordering::SeqCst);
    }

    #[must_use]
    pub fn quota_bytes(&self) -> usize {
        self.inner.quota_bytes
    }

    #[must_use]
    pub fn is_file_backed(&self) -> bool {
        self.inner.file_backed
    }

    /// Bytes currently used by keys and values.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the backend cannot be read.
    pub fn used_bytes(&self) -> Result<usize, StorageError> {
        let backend = self.lock_backend()?;
        Ok(used_bytes(&backend.load()?))
    }

    fn lock_backend(&self) -> Result<std::sync::MutexGuard<'_, Backend>, StorageError> {
        if self.inner.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Disabled);
        }
        Ok(self
            .inner
            .backend
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner))
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.lock_backend()?.read(key)
    }

    fn write(&self, source: ContextId, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        let old_value = {
            let mut backend = self.lock_backend()?;
            let mut entries = backend.load()?;
            let old_value = match value {
                Some(value) => entries.insert(key.to_owned(), value.to_owned()),
                None => entries.remove(key),
            };
            if old_value.as_deref() == value {
                return Ok(());
            }
            let needed = used_bytes(&entries);
            if value.is_some() && needed > self.inner.quota_bytes {
                return Err(StorageError::QuotaExceeded { needed, quota: self.inner.quota_bytes });
            }
            backend.store(entries)?;
            old_value
        };

        let event = StorageEvent {
            key: key.to_owned(),
            old_value,
            new_value: value.map(str::to_owned),
            source,
        };
        // No subscribers is fine; nobody else is listening yet.
        if self.inner.events.send(event).is_err() {
            debug!(key, "storage event had no subscribers");
        }
        Ok(())
    }
}

// =============================================================================
// CONTEXT HANDLE
// =============================================================================

/// One context's view of an origin store.
#[derive(Clone)]
pub struct ContextStorage {
    origin: OriginStore,
    id: ContextId,
}

impl ContextStorage {
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl StorageAdapter for ContextStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.origin.read(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.origin.write(self.id, key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.origin.write(self.id, key, None)
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents::new(self.origin.inner.events.subscribe(), Some(self.id))
    }

    fn is_blocking(&self) -> bool {
        self.origin.is_file_backed()
    }
}

#[cfg(test)]
#[path = "origin_test.rs"]
mod tests;
