//! Reference-counted shared polling scheduler for Beacon.
//!
//! `beacon-poll` lets many independent consumers request periodic execution
//! of a fetch action under a shared key. Requests for the same key coalesce
//! onto a single timer: the first consumer creates it (and gets one
//! immediate synchronous fetch), later consumers ride along for free, and
//! the timer is torn down only when the last consumer deregisters.
//!
//! # Features
//!
//! - **One timer per key**: arbitrarily many consumers, exactly one ticker
//!   task per active [`PollKey`]
//! - **Immediate first fetch**: data arrives without waiting a full interval
//! - **RAII subscriptions**: [`PollSubscription`] deregisters on drop, so
//!   start/stop pairing is structural, not a caller discipline
//! - **Latest-action semantics**: [`ActionCell`] and [`PollBinding`] let a
//!   consumer swap its fetch closure on every refresh without restarting
//!   the shared timer
//! - **Interval contention policy**: [`IntervalPolicy`] decides what
//!   happens when consumers of one key ask for different cadences
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use beacon_poll::{PollKey, PollRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> beacon_poll::Result<()> {
//! let registry = PollRegistry::new();
//! let key = PollKey::new("containers")?;
//!
//! // First consumer: fetches once immediately, then every second.
//! let subscription = registry.subscribe(
//!     key.clone(),
//!     Arc::new(|| { /* refresh container statuses */ }),
//!     Duration::from_secs(1),
//! )?;
//!
//! assert_eq!(registry.consumer_count(&key), 1);
//!
//! // Dropping the guard releases the registration and, as the last
//! // consumer, cancels the timer.
//! drop(subscription);
//! assert!(!registry.is_polling(&key));
//! # Ok(())
//! # }
//! ```
//!
//! # Refresh-cycle consumers
//!
//! Consumers whose fetch closure is recreated on every refresh (the
//! original motivation: UI components re-rendering) should go through
//! [`PollBinding`], which stores the newest closure into a stable
//! trampoline and resubscribes only when the key, interval, or declared
//! dependency values actually change:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use beacon_poll::{PollBinding, PollKey, PollRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> beacon_poll::Result<()> {
//! let registry = PollRegistry::new();
//! let mut binding: PollBinding<String> = PollBinding::with_registry(&registry);
//!
//! // Called on every refresh; the registration churns only when the
//! // project id (the dependency) changes.
//! binding.update(
//!     PollKey::new("containers")?,
//!     Duration::from_secs(1),
//!     "project-a".to_string(),
//!     Arc::new(|| { /* fetch for project-a */ }),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! # Process-wide sharing
//!
//! [`global()`] exposes a process-wide registry, with [`start_polling`] and
//! [`stop_polling`] as the bare start/stop surface. Components anywhere in
//! the process that poll under the same key share one timer without any
//! wiring between them.

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/beacon-poll/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod registry;
pub mod subscription;
pub mod types;

// Re-export main types at crate root
pub use error::{PollError, Result};
pub use registry::{PollController, PollRegistry, global, start_polling, stop_polling};
pub use subscription::{ActionCell, PollBinding, PollSubscription};
pub use types::{FetchAction, IntervalPolicy, PollKey, PollTicket};
