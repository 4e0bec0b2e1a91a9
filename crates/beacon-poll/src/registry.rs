//! Timer registry and polling controller.
//!
//! This module provides the [`PollRegistry`], the single owner of all poll
//! timers. Consumers register interest in a [`PollKey`] and the registry
//! coalesces them onto one timer per key: the first consumer creates the
//! timer (and gets an immediate synchronous fetch), later consumers ride
//! along, and the timer is cancelled only when the last consumer
//! deregisters.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PollError, Result};
use crate::types::{FetchAction, IntervalPolicy, PollKey, PollTicket};

/// One registered consumer of a key.
struct Consumer {
    id: u64,
    action: FetchAction,
    interval: Duration,
}

/// Live state for a key with at least one consumer.
///
/// Exists exactly while the key's consumer count is greater than zero.
struct KeyEntry {
    /// Consumers in registration order. Each tick drives the action of the
    /// front entry, so when the oldest consumer leaves the next-oldest
    /// takes over.
    roster: Vec<Consumer>,
    /// The interval the ticker task is currently running at.
    effective: Duration,
    /// Handle of the ticker task, aborted on cleanup or reschedule.
    ticker: JoinHandle<()>,
}

struct Inner {
    keys: Mutex<HashMap<PollKey, KeyEntry>>,
    next_id: AtomicU64,
    policy: IntervalPolicy,
}

/// The registration API consumed by subscription bindings.
///
/// [`PollRegistry`] is the real implementation; tests substitute mocks to
/// assert call pairing without spinning up timers.
pub trait PollController: Send + Sync {
    /// Registers a consumer for `key`, returning a ticket that must be
    /// handed back to [`deregister`](Self::deregister) exactly once.
    fn register(
        &self,
        key: PollKey,
        action: FetchAction,
        interval: Duration,
    ) -> Result<PollTicket>;

    /// Releases one registration. Stale or duplicated tickets are ignored.
    fn deregister(&self, ticket: PollTicket);
}

/// Reference-counted shared polling scheduler.
///
/// Cloning is cheap and all clones share the same timer state. The registry
/// must be used from within a tokio runtime, since each active key is
/// driven by a spawned ticker task.
///
/// Consumers sharing a key share one timer; the effective interval under
/// contention is decided by the registry's [`IntervalPolicy`].
pub struct PollRegistry {
    inner: Arc<Inner>,
}

impl PollRegistry {
    /// Creates a registry with the default interval policy
    /// ([`IntervalPolicy::Shortest`]).
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(IntervalPolicy::default())
    }

    /// Creates a registry with an explicit interval policy.
    #[must_use]
    pub fn with_policy(policy: IntervalPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                keys: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                policy,
            }),
        }
    }

    /// Returns the interval policy this registry applies to shared keys.
    #[must_use]
    pub fn policy(&self) -> IntervalPolicy {
        self.inner.policy
    }

    /// Registers a consumer for `key`.
    ///
    /// The first consumer for a key gets its action invoked once,
    /// synchronously, before this call returns, and a repeating timer is
    /// started; the first timer tick fires one full `interval` later.
    /// Subsequent consumers never trigger a duplicate immediate fetch.
    ///
    /// # Errors
    ///
    /// Returns `PollError::InvalidInterval` if `interval` is zero.
    pub fn register(
        &self,
        key: PollKey,
        action: FetchAction,
        interval: Duration,
    ) -> Result<PollTicket> {
        if interval.is_zero() {
            return Err(PollError::InvalidInterval {
                reason: "interval must be non-zero".to_string(),
            });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut immediate: Option<FetchAction> = None;

        {
            let mut keys = self.inner.keys.lock();
            match keys.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    entry.roster.push(Consumer {
                        id,
                        action,
                        interval,
                    });

                    let effective =
                        effective_interval(self.inner.policy, entry.effective, &entry.roster);
                    if effective != entry.effective {
                        entry.ticker.abort();
                        entry.ticker = self.spawn_ticker(key.clone(), effective);
                        entry.effective = effective;
                        debug!(
                            key = %key,
                            interval_ms = effective.as_millis() as u64,
                            "poll timer rescheduled"
                        );
                    }

                    debug!(
                        key = %key,
                        consumers = entry.roster.len(),
                        "consumer joined shared poll"
                    );
                }
                Entry::Vacant(vacant) => {
                    immediate = Some(Arc::clone(&action));
                    let ticker = self.spawn_ticker(key.clone(), interval);
                    vacant.insert(KeyEntry {
                        roster: vec![Consumer {
                            id,
                            action,
                            interval,
                        }],
                        effective: interval,
                        ticker,
                    });
                    info!(
                        key = %key,
                        interval_ms = interval.as_millis() as u64,
                        "poll timer created"
                    );
                }
            }
        }

        // Outside the lock: the action may re-enter the registry.
        if let Some(action) = immediate {
            invoke_action(&key, &action);
        }

        Ok(PollTicket::new(key, id))
    }

    /// Releases one registration.
    ///
    /// When the last consumer of a key leaves, the timer is aborted and the
    /// key's state is removed entirely, so a later `register` behaves as a
    /// true first consumer. Tickets that no longer match a live
    /// registration are ignored.
    pub fn deregister(&self, ticket: PollTicket) {
        let mut keys = self.inner.keys.lock();

        let Some(entry) = keys.get_mut(ticket.key()) else {
            debug!(key = %ticket.key(), "deregister for inactive key ignored");
            return;
        };

        let before = entry.roster.len();
        entry.roster.retain(|c| c.id != ticket.id());
        if entry.roster.len() == before {
            debug!(
                key = %ticket.key(),
                id = ticket.id(),
                "deregister with stale ticket ignored"
            );
            return;
        }

        if entry.roster.is_empty() {
            if let Some(removed) = keys.remove(ticket.key()) {
                removed.ticker.abort();
            }
            info!(key = %ticket.key(), "last consumer left, poll timer cancelled");
        } else {
            let effective = effective_interval(self.inner.policy, entry.effective, &entry.roster);
            if effective != entry.effective {
                entry.ticker.abort();
                entry.ticker = self.spawn_ticker(ticket.key().clone(), effective);
                entry.effective = effective;
                debug!(
                    key = %ticket.key(),
                    interval_ms = effective.as_millis() as u64,
                    "poll timer rescheduled"
                );
            }
            debug!(
                key = %ticket.key(),
                consumers = entry.roster.len(),
                "consumer left shared poll"
            );
        }
    }

    /// Returns the number of consumers currently registered for `key`.
    #[must_use]
    pub fn consumer_count(&self, key: &PollKey) -> usize {
        let keys = self.inner.keys.lock();
        keys.get(key).map_or(0, |entry| entry.roster.len())
    }

    /// Returns `true` if `key` has a live timer.
    #[must_use]
    pub fn is_polling(&self, key: &PollKey) -> bool {
        let keys = self.inner.keys.lock();
        keys.contains_key(key)
    }

    /// Returns the interval the key's timer is currently running at.
    #[must_use]
    pub fn effective_interval(&self, key: &PollKey) -> Option<Duration> {
        let keys = self.inner.keys.lock();
        keys.get(key).map(|entry| entry.effective)
    }

    /// Returns the number of keys with live timers.
    #[must_use]
    pub fn key_count(&self) -> usize {
        let keys = self.inner.keys.lock();
        keys.len()
    }

    /// Returns all keys with live timers.
    #[must_use]
    pub fn active_keys(&self) -> Vec<PollKey> {
        let keys = self.inner.keys.lock();
        keys.keys().cloned().collect()
    }

    /// Spawns the ticker task for `key` at `period`.
    ///
    /// The task holds only a weak reference to the registry, so dropping
    /// the last registry handle lets every ticker wind down on its next
    /// tick.
    fn spawn_ticker(&self, key: PollKey, period: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;

                let action = match lookup_front_action(&inner, &key) {
                    Some(action) => action,
                    None => break,
                };
                invoke_action(&key, &action);
            }
        })
    }
}

/// Resolves the front consumer's action without holding a strong reference
/// to the registry while the action runs.
fn lookup_front_action(inner: &Weak<Inner>, key: &PollKey) -> Option<FetchAction> {
    let inner = inner.upgrade()?;
    let keys = inner.keys.lock();
    keys.get(key)
        .and_then(|entry| entry.roster.first().map(|c| Arc::clone(&c.action)))
}

/// Applies the interval policy over the current roster.
fn effective_interval(
    policy: IntervalPolicy,
    current: Duration,
    roster: &[Consumer],
) -> Duration {
    match policy {
        IntervalPolicy::FirstWins => current,
        IntervalPolicy::Shortest => roster
            .iter()
            .map(|c| c.interval)
            .min()
            .unwrap_or(current),
    }
}

/// Invokes a fetch action, containing panics so one failing fetch cannot
/// take the timer down with it.
fn invoke_action(key: &PollKey, action: &FetchAction) {
    let outcome = catch_unwind(AssertUnwindSafe(|| action()));
    if outcome.is_err() {
        warn!(key = %key, "fetch action panicked, poll timer continues");
    }
}

impl Default for PollRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PollRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for PollRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollRegistry")
            .field("policy", &self.inner.policy)
            .field("active_keys", &self.key_count())
            .finish()
    }
}

impl PollController for PollRegistry {
    fn register(
        &self,
        key: PollKey,
        action: FetchAction,
        interval: Duration,
    ) -> Result<PollTicket> {
        Self::register(self, key, action, interval)
    }

    fn deregister(&self, ticket: PollTicket) {
        Self::deregister(self, ticket);
    }
}

static GLOBAL: Lazy<PollRegistry> = Lazy::new(PollRegistry::new);

/// Returns the process-wide default registry.
///
/// All callers going through [`start_polling`]/[`stop_polling`] share this
/// instance, which is what makes cross-component timer sharing work without
/// any wiring.
#[must_use]
pub fn global() -> &'static PollRegistry {
    &GLOBAL
}

/// Registers `action` under `key` on the process-wide registry.
///
/// # Errors
///
/// Returns an error if `key` is not a valid [`PollKey`] or `interval` is
/// zero.
pub fn start_polling(key: &str, action: FetchAction, interval: Duration) -> Result<PollTicket> {
    let key = PollKey::new(key)?;
    GLOBAL.register(key, action, interval)
}

/// Releases one registration on the process-wide registry.
pub fn stop_polling(ticket: PollTicket) {
    GLOBAL.deregister(ticket);
}
