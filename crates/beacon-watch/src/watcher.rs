//! Status watcher.
//!
//! Wires a [`StatusSource`] and a [`StatusStore`] into the polling
//! scheduler: starting the watcher registers one fetch action per status
//! feed under a well-known key, stopping it (or dropping it) releases the
//! registrations. Watchers that share a registry, source, and store also
//! share the underlying timers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use beacon_poll::{FetchAction, PollKey, PollRegistry, PollSubscription};
use tracing::{info, warn};

use crate::error::Result;
use crate::source::StatusSource;
use crate::store::StatusStore;

/// Poll key for the container status feed.
pub const CONTAINERS_KEY: &str = "containers";
/// Poll key for the readiness feed.
pub const READINESS_KEY: &str = "readiness";

/// Polling cadences for the two status feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// How often to refresh container statuses.
    pub containers_interval: Duration,
    /// How often to refresh readiness.
    pub readiness_interval: Duration,
}

impl WatcherConfig {
    /// Sets the container refresh interval.
    #[must_use]
    pub const fn with_containers_interval(mut self, interval: Duration) -> Self {
        self.containers_interval = interval;
        self
    }

    /// Sets the readiness refresh interval.
    #[must_use]
    pub const fn with_readiness_interval(mut self, interval: Duration) -> Self {
        self.readiness_interval = interval;
        self
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            containers_interval: Duration::from_secs(1),
            readiness_interval: Duration::from_secs(5),
        }
    }
}

/// Keeps a [`StatusStore`] fresh by polling a [`StatusSource`].
///
/// Poll keys are scoped to the registry, so watchers meant to share timers
/// must also share the source and store (use
/// [`with_store`](Self::with_store)); otherwise give them separate
/// registries.
pub struct StatusWatcher {
    source: Arc<dyn StatusSource>,
    store: StatusStore,
    registry: PollRegistry,
    config: WatcherConfig,
    subscriptions: Vec<PollSubscription>,
}

impl StatusWatcher {
    /// Creates a stopped watcher with a fresh store and default config.
    #[must_use]
    pub fn new(source: Arc<dyn StatusSource>, registry: PollRegistry) -> Self {
        Self::with_store(source, registry, StatusStore::new())
    }

    /// Creates a stopped watcher writing into an existing store.
    #[must_use]
    pub fn with_store(
        source: Arc<dyn StatusSource>,
        registry: PollRegistry,
        store: StatusStore,
    ) -> Self {
        Self {
            source,
            store,
            registry,
            config: WatcherConfig::default(),
            subscriptions: Vec::new(),
        }
    }

    /// Replaces the polling config. Takes effect on the next `start`.
    #[must_use]
    pub fn with_config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the store this watcher writes into.
    #[must_use]
    pub fn store(&self) -> StatusStore {
        self.store.clone()
    }

    /// Returns the active config.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Returns `true` while the watcher holds live registrations.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Registers both status feeds with the scheduler.
    ///
    /// As with any first consumer, each feed is fetched once synchronously
    /// before this call returns, so the store is populated immediately.
    /// Calling `start` on a running watcher is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails (zero interval).
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let containers = self.registry.subscribe(
            PollKey::new(CONTAINERS_KEY)?,
            self.containers_action(),
            self.config.containers_interval,
        )?;
        let readiness = self.registry.subscribe(
            PollKey::new(READINESS_KEY)?,
            self.readiness_action(),
            self.config.readiness_interval,
        )?;

        self.subscriptions.push(containers);
        self.subscriptions.push(readiness);
        info!(
            containers_interval_ms = self.config.containers_interval.as_millis() as u64,
            readiness_interval_ms = self.config.readiness_interval.as_millis() as u64,
            "status watcher started"
        );
        Ok(())
    }

    /// Releases all registrations. Idempotent.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.subscriptions.clear();
            info!("status watcher stopped");
        }
    }

    fn containers_action(&self) -> FetchAction {
        let source = Arc::clone(&self.source);
        let store = self.store.clone();
        Arc::new(move || match source.fetch_containers() {
            Ok(containers) => store.apply_containers(containers),
            Err(e) => {
                warn!(error = %e, "container status fetch failed");
                store.record_error(e.to_string());
            }
        })
    }

    fn readiness_action(&self) -> FetchAction {
        let source = Arc::clone(&self.source);
        let store = self.store.clone();
        Arc::new(move || match source.fetch_readiness() {
            Ok(readiness) => store.apply_readiness(readiness),
            Err(e) => {
                warn!(error = %e, "readiness fetch failed");
                store.record_error(e.to_string());
            }
        })
    }
}

impl fmt::Debug for StatusWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusWatcher")
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
