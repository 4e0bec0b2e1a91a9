//! Live container and readiness status watching for Beacon.
//!
//! `beacon-watch` keeps typed status snapshots fresh by registering fetch
//! actions with the [`beacon-poll`](beacon_poll) scheduler. It is the
//! consumer side of the scheduler: a [`StatusSource`] produces statuses, a
//! [`StatusStore`] holds the latest snapshot for readers, and a
//! [`StatusWatcher`] ties the two to the shared poll timers under the
//! well-known keys `"containers"` and `"readiness"`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use beacon_poll::PollRegistry;
//! use beacon_watch::{StaticSource, StatusWatcher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> beacon_watch::Result<()> {
//! let registry = PollRegistry::new();
//! let mut watcher = StatusWatcher::new(Arc::new(StaticSource::default()), registry);
//!
//! // Registers both feeds; each is fetched once before start() returns.
//! watcher.start()?;
//!
//! let store = watcher.store();
//! assert!(store.is_ready());
//!
//! watcher.stop();
//! # Ok(())
//! # }
//! ```
//!
//! Watchers meant to share timers must share the registry, source, and
//! store; see [`StatusWatcher::with_store`].

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/beacon-watch/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod source;
pub mod store;
pub mod types;
pub mod watcher;

// Re-export main types at crate root
pub use error::{Result, WatchError};
pub use source::{StaticSource, StatusSource};
pub use store::StatusStore;
pub use types::{ContainerState, ContainerStatus, ReadinessStatus, StatusSnapshot};
pub use watcher::{CONTAINERS_KEY, READINESS_KEY, StatusWatcher, WatcherConfig};
