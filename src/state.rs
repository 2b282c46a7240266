//! Shared application state for one dashboard context.
//!
//! DESIGN
//! ======
//! `AppState` bundles what every feature module needs: the context's storage
//! handle, the in-memory dashboard model, the sync monitor watching that
//! storage, and the access policy. Clone is cheap; every field is an `Arc`.

use std::sync::{Arc, RwLock};

use crate::access::AccessPolicy;
use crate::model::DashboardModel;
use crate::services::sync::SyncMonitor;
use crate::storage::StorageAdapter;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageAdapter>,
    pub model: Arc<RwLock<DashboardModel>>,
    pub monitor: Arc<SyncMonitor>,
    pub access: Arc<dyn AccessPolicy>,
}

impl AppState {
    /// Load the model from `storage` and wire a monitor to it.
    ///
    /// Does not capture or start the monitor; see `services::sync::spawn_monitor`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, access: Arc<dyn AccessPolicy>) -> Self {
        let model = Arc::new(RwLock::new(DashboardModel::load(storage.as_ref())));
        let monitor = Arc::new(SyncMonitor::new(storage.clone(), model.clone()));
        Self { storage, model, monitor, access }
    }

    /// Read access to the model, tolerating a poisoned lock.
    pub fn model(&self) -> std::sync::RwLockReadGuard<'_, DashboardModel> {
        self.model.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn model_mut(&self) -> std::sync::RwLockWriteGuard<'_, DashboardModel> {
        self.model.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::access::{Role, RoleTable};
    use crate::storage::OriginStore;

    /// Roles used across tests: ann is admin, bo is editor, cy is viewer.
    #[must_use]
    pub fn test_roles() -> RoleTable {
        RoleTable::new().with("ann", Role::Admin).with("bo", Role::Editor).with("cy", Role::Viewer)
    }

    /// A fresh context on `origin` with the test roles.
    #[must_use]
    pub fn test_app_state_on(origin: &OriginStore) -> AppState {
        AppState::new(Arc::new(origin.context()), Arc::new(test_roles()))
    }

    /// A context on its own in-memory origin.
    #[must_use]
    pub fn test_app_state() -> AppState {
        test_app_state_on(&OriginStore::in_memory(64 * 1024))
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
