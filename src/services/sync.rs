//! Sync monitor — keeps the stored snapshot in step with live collections.
//!
//! DESIGN
//! ======
//! `SyncMonitor` owns three synchronous operations: `capture` (write a new
//! snapshot of every named collection), `has_diverged` (compare live
//! collections against the stored snapshot), and `force_refresh` (rebuild
//! the in-memory dashboard model from storage, then capture).
//!
//! `spawn_monitor` captures once, then runs two tasks: a timer that checks
//! for divergence every interval and re-captures when needed, and a
//! listener that re-captures on every foreign write to a collection key.
//! The timer never forces a refresh; views stay stale until a caller asks.
//! Both tasks are owned by one `MonitorHandle` and die together.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures stop here. Reads degrade to empty collections, a failed
//! snapshot write makes `capture` return `None`, and a malformed stored
//! snapshot counts as "no snapshot". Every case is logged and none of them
//! ends either task.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::collections::{NamedCollection, read_collection};
use crate::model::DashboardModel;
use crate::snapshot::{SNAPSHOT_KEY, SyncSnapshot, serialize_records};
use crate::storage::StorageAdapter;

// =============================================================================
// MONITOR
// =============================================================================

pub struct SyncMonitor {
    storage: Arc<dyn StorageAdapter>,
    model: Arc<RwLock<DashboardModel>>,
    /// Timestamp of the last successful capture; keeps timestamps non-decreasing.
    /// Held for the whole of `capture`, so captures are serialized.
    last_capture: Mutex<Option<OffsetDateTime>>,
}

impl SyncMonitor {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, model: Arc<RwLock<DashboardModel>>) -> Self {
        Self { storage, model, last_capture: Mutex::new(None) }
    }

    /// Snapshot every named collection and store it under `SNAPSHOT_KEY`.
    ///
    /// Returns `None` when the snapshot could not be written.
    pub fn capture(&self) -> Option<SyncSnapshot> {
        // Reads, timestamp and write form one critical section; a capture
        // working from older reads must not land after a newer one.
        let mut last_capture = self
            .last_capture
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let collections = NamedCollection::ALL
            .into_iter()
            .map(|c| (c, read_collection(self.storage.as_ref(), c)))
            .collect::<BTreeMap<_, _>>();

        let now = OffsetDateTime::now_utc();
        // EDGE: wall clock may step back; never hand out an older timestamp.
        let captured_at = last_capture.map_or(now, |prev| prev.max(now));
        let snapshot = SyncSnapshot::new(collections, captured_at);

        let encoded = match snapshot.to_json() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "snapshot encode failed");
                return None;
            }
        };
        if let Err(e) = self.storage.set(SNAPSHOT_KEY, &encoded) {
            warn!(error = %e, "snapshot write failed; keeping previous snapshot");
            return None;
        }

        *last_capture = Some(captured_at);
        debug!(
            action_items = snapshot.collection(NamedCollection::ActionItems).len(),
            social_posts = snapshot.collection(NamedCollection::SocialPosts).len(),
            staff = snapshot.collection(NamedCollection::Staff).len(),
            "snapshot captured"
        );
        Some(snapshot)
    }

    /// Whether any live collection differs from the stored snapshot.
    ///
    /// `false` when no readable snapshot exists.
    #[must_use]
    pub fn has_diverged(&self) -> bool {
        let Some(snapshot) = self.stored_snapshot() else {
            return false;
        };
        NamedCollection::ALL.into_iter().any(|c| {
            let live = serialize_records(&read_collection(self.storage.as_ref(), c));
            let diverged = live != snapshot.serialized(c);
            if diverged {
                debug!(collection = c.key(), "collection diverged from snapshot");
            }
            diverged
        })
    }

    /// Rebuild the in-memory model from storage and capture a new snapshot.
    ///
    /// This is the only operation that brings already-loaded views back in
    /// line with storage.
    pub fn force_refresh(&self) -> Option<SyncSnapshot> {
        let fresh = DashboardModel::load(self.storage.as_ref());
        {
            let mut model = self.model.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            *model = fresh;
        }
        info!("dashboard model reloaded from storage");
        self.capture()
    }

    /// The stored snapshot, if present and readable.
    #[must_use]
    pub fn stored_snapshot(&self) -> Option<SyncSnapshot> {
        let raw = match self.storage.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "snapshot read failed");
                return None;
            }
        };
        match SyncSnapshot::from_stored(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "stored snapshot is malformed; ignoring");
                None
            }
        }
    }

    /// Capture only if live collections drifted. Returns whether a capture ran.
    pub fn reconcile(&self) -> bool {
        if !self.has_diverged() {
            return false;
        }
        info!("collections diverged from snapshot; resynchronizing");
        self.capture();
        true
    }

    // -------------------------------------------------------------------------
    // Collaborator contract used by feature modules.
    // -------------------------------------------------------------------------

    /// Capture a fresh snapshot now. Call after every collection write.
    pub fn sync_data(&self) -> Option<SyncSnapshot> {
        self.capture()
    }

    /// Read-only divergence check.
    #[must_use]
    pub fn check_for_updates(&self) -> bool {
        self.has_diverged()
    }

    /// Force a full reload of the in-memory model.
    pub fn refresh_data(&self) -> Option<SyncSnapshot> {
        self.force_refresh()
    }
}

// =============================================================================
// SCHEDULING
// =============================================================================

/// Owns the timer and listener tasks of a running monitor.
///
/// Dropping the handle cancels both tasks, same as `dispose`.
pub struct MonitorHandle {
    poll: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl MonitorHandle {
    /// Cancel the timer and the listener together.
    pub fn dispose(self) {
        drop(self);
    }

    /// True while both tasks are still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.poll.is_finished() && !self.listener.is_finished()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.poll.abort();
        self.listener.abort();
        debug!("sync monitor stopped");
    }
}

/// Run a monitor operation, moving it to the blocking pool when the storage
/// does synchronous file I/O.
async fn run_storage_op<F>(monitor: &Arc<SyncMonitor>, op: F)
where
    F: FnOnce(&SyncMonitor) + Send + 'static,
{
    if !monitor.storage.is_blocking() {
        op(monitor.as_ref());
        return;
    }
    let monitor = monitor.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || op(monitor.as_ref())).await {
        warn!(error = %e, "blocking storage task failed");
    }
}

/// Capture once, then start the periodic check and the change listener.
///
/// Must be called inside a tokio runtime. The startup capture runs on the
/// caller's thread; later storage work goes to the blocking pool when the
/// storage reports `is_blocking`.
pub fn spawn_monitor(monitor: Arc<SyncMonitor>, interval: Duration) -> MonitorHandle {
    // Subscribe before the first capture so no foreign write slips between them.
    let mut events = monitor.storage.subscribe();
    monitor.capture();
    info!(interval_secs = interval.as_secs(), "sync monitor started");

    let poll = {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                run_storage_op(&monitor, |m| {
                    m.reconcile();
                })
                .await;
            }
        })
    };

    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(collection) = NamedCollection::from_key(&event.key) {
                        debug!(collection = collection.key(), source = %event.source, "collection changed elsewhere");
                        run_storage_op(&monitor, |m| {
                            m.capture();
                        })
                        .await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // EDGE: skipped events may include collection writes.
                    warn!(skipped, "storage event stream lagged");
                    run_storage_op(&monitor, |m| {
                        m.capture();
                    })
                    .await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    MonitorHandle { poll, listener }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
