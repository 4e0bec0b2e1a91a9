//! Latest-snapshot store.
//!
//! Fetch actions write here from timer ticks; readers take cheap cloned
//! snapshots. Cloning the store shares the underlying cells.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{ContainerStatus, ReadinessStatus, StatusSnapshot};

struct StoreInner {
    containers: RwLock<Option<StatusSnapshot<Vec<ContainerStatus>>>>,
    readiness: RwLock<Option<StatusSnapshot<ReadinessStatus>>>,
    last_error: RwLock<Option<String>>,
}

/// Shared cell holding the most recent status snapshots.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<StoreInner>,
}

impl StatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                containers: RwLock::new(None),
                readiness: RwLock::new(None),
                last_error: RwLock::new(None),
            }),
        }
    }

    /// Records a fresh container snapshot and clears any previous fetch
    /// error.
    pub fn apply_containers(&self, containers: Vec<ContainerStatus>) {
        *self.inner.containers.write() = Some(StatusSnapshot::now(containers));
        *self.inner.last_error.write() = None;
    }

    /// Records a fresh readiness snapshot and clears any previous fetch
    /// error.
    pub fn apply_readiness(&self, readiness: ReadinessStatus) {
        *self.inner.readiness.write() = Some(StatusSnapshot::now(readiness));
        *self.inner.last_error.write() = None;
    }

    /// Records a fetch failure. The last good snapshots are kept.
    pub fn record_error(&self, reason: impl Into<String>) {
        *self.inner.last_error.write() = Some(reason.into());
    }

    /// The most recent container snapshot, if any fetch has succeeded.
    #[must_use]
    pub fn containers(&self) -> Option<StatusSnapshot<Vec<ContainerStatus>>> {
        self.inner.containers.read().clone()
    }

    /// The most recent readiness snapshot, if any fetch has succeeded.
    #[must_use]
    pub fn readiness(&self) -> Option<StatusSnapshot<ReadinessStatus>> {
        self.inner.readiness.read().clone()
    }

    /// Convenience: `true` if the latest readiness snapshot reports ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .readiness
            .read()
            .as_ref()
            .is_some_and(|snapshot| snapshot.value.ready)
    }

    /// The most recent fetch error, cleared by the next successful fetch.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStore")
            .field("has_containers", &self.inner.containers.read().is_some())
            .field("has_readiness", &self.inner.readiness.read().is_some())
            .field("last_error", &self.last_error())
            .finish()
    }
}
