//! The status source seam.
//!
//! The watcher treats whatever produces statuses as an opaque, synchronous
//! fetch. Real deployments implement [`StatusSource`] over their backend
//! client; tests and demos use [`StaticSource`].

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{ContainerStatus, ReadinessStatus};

/// Something that can produce current statuses on demand.
///
/// Implementations are invoked from poll timer ticks and must not assume
/// any particular calling thread. A fetch that can outlast its polling
/// interval should guard against overlapping itself.
pub trait StatusSource: Send + Sync {
    /// Fetches the current status of all watched containers.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::SourceFailed` if the backend cannot be reached.
    fn fetch_containers(&self) -> Result<Vec<ContainerStatus>>;

    /// Fetches the current environment readiness.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::SourceFailed` if the backend cannot be reached.
    fn fetch_readiness(&self) -> Result<ReadinessStatus>;
}

/// In-memory source serving preset values.
pub struct StaticSource {
    containers: RwLock<Vec<ContainerStatus>>,
    readiness: RwLock<ReadinessStatus>,
}

impl StaticSource {
    /// Creates a source with the given initial values.
    #[must_use]
    pub fn new(containers: Vec<ContainerStatus>, readiness: ReadinessStatus) -> Self {
        Self {
            containers: RwLock::new(containers),
            readiness: RwLock::new(readiness),
        }
    }

    /// Replaces the container statuses served from now on.
    pub fn set_containers(&self, containers: Vec<ContainerStatus>) {
        *self.containers.write() = containers;
    }

    /// Replaces the readiness served from now on.
    pub fn set_readiness(&self, readiness: ReadinessStatus) {
        *self.readiness.write() = readiness;
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(
            Vec::new(),
            ReadinessStatus {
                ready: true,
                installed: true,
                message: None,
            },
        )
    }
}

impl StatusSource for StaticSource {
    fn fetch_containers(&self) -> Result<Vec<ContainerStatus>> {
        Ok(self.containers.read().clone())
    }

    fn fetch_readiness(&self) -> Result<ReadinessStatus> {
        Ok(self.readiness.read().clone())
    }
}
