//! Consumer-side subscription machinery.
//!
//! The registry hands out tickets; this module wraps them in constructs
//! that make the pairing invariant structural instead of a caller
//! discipline:
//!
//! - [`PollSubscription`] releases its registration on drop, so one
//!   registration gets exactly one deregistration no matter how the owning
//!   scope ends.
//! - [`ActionCell`] decouples the callback identity the registry holds from
//!   the logic that actually runs, so a consumer can swap its fetch closure
//!   on every refresh without churning the timer.
//! - [`PollBinding`] combines both into the full resubscribe-on-change
//!   state machine a render-cycle consumer needs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::registry::{PollController, PollRegistry};
use crate::types::{FetchAction, PollKey, PollTicket};

/// Single-slot mutable cell holding the current fetch action.
///
/// The [`trampoline`](Self::trampoline) reads the slot at call time, so the
/// registry can keep invoking one fixed callback while the logic behind it
/// is replaced arbitrarily often.
#[derive(Clone)]
pub struct ActionCell {
    slot: Arc<Mutex<FetchAction>>,
}

impl ActionCell {
    /// Creates a cell holding `action`.
    #[must_use]
    pub fn new(action: FetchAction) -> Self {
        Self {
            slot: Arc::new(Mutex::new(action)),
        }
    }

    /// Replaces the action. Takes effect on the next invocation of any
    /// trampoline produced by this cell.
    pub fn store(&self, action: FetchAction) {
        *self.slot.lock() = action;
    }

    /// Returns a stable action that delegates to whatever the cell holds
    /// at invocation time.
    #[must_use]
    pub fn trampoline(&self) -> FetchAction {
        let slot = Arc::clone(&self.slot);
        Arc::new(move || {
            // Clone the current action out so the slot is not locked while
            // the action runs (it may itself store a replacement).
            let action = { Arc::clone(&*slot.lock()) };
            action();
        })
    }
}

impl fmt::Debug for ActionCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCell").finish_non_exhaustive()
    }
}

/// RAII guard over one registration.
///
/// Dropping the subscription deregisters it; the registration can never be
/// released twice or leaked past the guard's lifetime.
pub struct PollSubscription {
    controller: Arc<dyn PollController>,
    ticket: Option<PollTicket>,
}

impl PollSubscription {
    /// Registers `action` under `key` and wraps the resulting ticket.
    ///
    /// # Errors
    ///
    /// Propagates registration errors from the controller.
    pub fn new(
        controller: Arc<dyn PollController>,
        key: PollKey,
        action: FetchAction,
        interval: Duration,
    ) -> Result<Self> {
        let ticket = controller.register(key, action, interval)?;
        Ok(Self {
            controller,
            ticket: Some(ticket),
        })
    }

    /// The key this subscription is registered under.
    #[must_use]
    pub fn key(&self) -> Option<&PollKey> {
        self.ticket.as_ref().map(PollTicket::key)
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.controller.deregister(ticket);
        }
    }
}

impl fmt::Debug for PollSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSubscription")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

impl PollRegistry {
    /// Registers `action` under `key` and returns a guard that deregisters
    /// on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is zero.
    pub fn subscribe(
        &self,
        key: PollKey,
        action: FetchAction,
        interval: Duration,
    ) -> Result<PollSubscription> {
        PollSubscription::new(Arc::new(self.clone()), key, action, interval)
    }
}

/// Parameters of the currently registered generation of a binding.
struct Generation<D> {
    key: PollKey,
    interval: Duration,
    deps: D,
}

/// Bridge between a consumer's refresh cycle and the polling controller.
///
/// A consumer calls [`update`](Self::update) on every refresh with its
/// current key, interval, dependency values, and fetch closure. The binding
/// stores the closure into its [`ActionCell`] unconditionally, but touches
/// the controller only when the key, interval, or dependencies differ from
/// the registered generation — an action whose identity changed on its own
/// never causes a stop/start cycle. Dropping the binding releases the live
/// registration.
///
/// `D` is the dependency set, compared by equality; use `()` when there are
/// no dependencies beyond the key and interval.
pub struct PollBinding<D = ()>
where
    D: PartialEq,
{
    controller: Arc<dyn PollController>,
    cell: ActionCell,
    current: Option<Generation<D>>,
    subscription: Option<PollSubscription>,
}

impl<D> PollBinding<D>
where
    D: PartialEq,
{
    /// Creates an unregistered binding against `controller`.
    #[must_use]
    pub fn new(controller: Arc<dyn PollController>) -> Self {
        Self {
            controller,
            cell: ActionCell::new(Arc::new(|| {})),
            current: None,
            subscription: None,
        }
    }

    /// Creates an unregistered binding against a registry handle.
    #[must_use]
    pub fn with_registry(registry: &PollRegistry) -> Self {
        Self::new(Arc::new(registry.clone()))
    }

    /// Applies one refresh cycle.
    ///
    /// Always installs `action` as the latest logic. Deregisters the old
    /// generation and registers a new one exactly when `key`, `interval`,
    /// or `deps` differ from the registered generation (or on the first
    /// call).
    ///
    /// # Errors
    ///
    /// Propagates registration errors; the binding is left unregistered in
    /// that case and the next `update` retries.
    pub fn update(
        &mut self,
        key: PollKey,
        interval: Duration,
        deps: D,
        action: FetchAction,
    ) -> Result<()> {
        self.cell.store(action);

        let unchanged = self.current.as_ref().is_some_and(|generation| {
            generation.key == key && generation.interval == interval && generation.deps == deps
        });
        if unchanged && self.subscription.is_some() {
            return Ok(());
        }

        // Close the old scope before opening the new one: one deregister,
        // then one register.
        self.subscription = None;
        self.current = None;

        let subscription = PollSubscription::new(
            Arc::clone(&self.controller),
            key.clone(),
            self.cell.trampoline(),
            interval,
        )?;
        self.subscription = Some(subscription);
        self.current = Some(Generation {
            key,
            interval,
            deps,
        });

        Ok(())
    }

    /// Releases the live registration, returning the binding to its
    /// unregistered state. Idempotent.
    pub fn release(&mut self) {
        self.subscription = None;
        self.current = None;
    }

    /// Returns `true` while a registration is live.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.subscription.is_some()
    }

    /// The key of the live registration, if any.
    #[must_use]
    pub fn key(&self) -> Option<&PollKey> {
        self.current.as_ref().map(|generation| &generation.key)
    }
}

impl<D> fmt::Debug for PollBinding<D>
where
    D: PartialEq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollBinding")
            .field("registered", &self.is_registered())
            .field("key", &self.key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::PollError;

    fn key(raw: &str) -> PollKey {
        PollKey::new(raw).unwrap()
    }

    fn counting_action() -> (FetchAction, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        let action: FetchAction = Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        (action, count)
    }

    /// Controller double that records call pairing without any timers.
    struct MockController {
        registers: AtomicUsize,
        deregisters: AtomicUsize,
        next_id: AtomicUsize,
    }

    impl MockController {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                registers: AtomicUsize::new(0),
                deregisters: AtomicUsize::new(0),
                next_id: AtomicUsize::new(0),
            })
        }

        fn register_calls(&self) -> usize {
            self.registers.load(Ordering::SeqCst)
        }

        fn deregister_calls(&self) -> usize {
            self.deregisters.load(Ordering::SeqCst)
        }
    }

    impl PollController for MockController {
        fn register(
            &self,
            key: PollKey,
            _action: FetchAction,
            _interval: Duration,
        ) -> Result<PollTicket> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(PollTicket::new(key, id))
        }

        fn deregister(&self, _ticket: PollTicket) {
            self.deregisters.fetch_add(1, Ordering::SeqCst);
        }
    }

    mod action_cell_tests {
        use super::*;

        #[test]
        fn trampoline_invokes_latest_action() {
            let (first, first_count) = counting_action();
            let (second, second_count) = counting_action();

            let cell = ActionCell::new(first);
            let trampoline = cell.trampoline();

            trampoline();
            assert_eq!(first_count.load(Ordering::SeqCst), 1);

            // Same trampoline, new logic.
            cell.store(second);
            trampoline();

            assert_eq!(first_count.load(Ordering::SeqCst), 1);
            assert_eq!(second_count.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn action_may_replace_itself() {
            let (replacement, replacement_count) = counting_action();
            let cell = ActionCell::new(Arc::new(|| {}));
            let trampoline = cell.trampoline();

            let inner_cell = cell.clone();
            cell.store(Arc::new(move || {
                inner_cell.store(Arc::clone(&replacement));
            }));

            trampoline();
            trampoline();
            assert_eq!(replacement_count.load(Ordering::SeqCst), 1);
        }
    }

    mod subscription_tests {
        use super::*;

        #[test]
        fn drop_deregisters_exactly_once() {
            let mock = MockController::new();
            let (action, _) = counting_action();

            let subscription = PollSubscription::new(
                Arc::clone(&mock) as Arc<dyn PollController>,
                key("readiness"),
                action,
                Duration::from_secs(1),
            )
            .unwrap();

            assert_eq!(mock.register_calls(), 1);
            assert_eq!(mock.deregister_calls(), 0);
            assert_eq!(subscription.key().map(PollKey::as_str), Some("readiness"));

            drop(subscription);
            assert_eq!(mock.deregister_calls(), 1);
        }

        #[tokio::test]
        async fn registry_subscribe_round_trip() {
            let registry = PollRegistry::new();
            let (action, count) = counting_action();

            let subscription = registry
                .subscribe(key("containers"), action, Duration::from_secs(60))
                .unwrap();

            assert_eq!(count.load(Ordering::SeqCst), 1);
            assert_eq!(registry.consumer_count(&key("containers")), 1);

            drop(subscription);
            assert!(!registry.is_polling(&key("containers")));
        }
    }

    mod binding_tests {
        use super::*;

        #[test]
        fn first_update_registers() {
            let mock = MockController::new();
            let mut binding: PollBinding<Vec<String>> =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);
            let (action, _) = counting_action();

            assert!(!binding.is_registered());
            binding
                .update(key("containers"), Duration::from_secs(1), vec![], action)
                .unwrap();

            assert!(binding.is_registered());
            assert_eq!(mock.register_calls(), 1);
            assert_eq!(mock.deregister_calls(), 0);
        }

        #[test]
        fn action_identity_change_does_not_resubscribe() {
            let mock = MockController::new();
            let mut binding: PollBinding =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);

            for _ in 0..5 {
                let (action, _) = counting_action();
                binding
                    .update(key("containers"), Duration::from_secs(1), (), action)
                    .unwrap();
            }

            assert_eq!(mock.register_calls(), 1);
            assert_eq!(mock.deregister_calls(), 0);
        }

        #[test]
        fn dependency_change_resubscribes_once() {
            let mock = MockController::new();
            let mut binding: PollBinding<Vec<String>> =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);

            let (action, _) = counting_action();
            binding
                .update(
                    key("containers"),
                    Duration::from_secs(1),
                    vec!["project-a".to_string()],
                    action,
                )
                .unwrap();

            let (action, _) = counting_action();
            binding
                .update(
                    key("containers"),
                    Duration::from_secs(1),
                    vec!["project-b".to_string()],
                    action,
                )
                .unwrap();

            assert_eq!(mock.register_calls(), 2);
            assert_eq!(mock.deregister_calls(), 1);
        }

        #[test]
        fn key_change_resubscribes_under_new_key() {
            let mock = MockController::new();
            let mut binding: PollBinding =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);

            let (action, _) = counting_action();
            binding
                .update(key("containers"), Duration::from_secs(1), (), action)
                .unwrap();

            let (action, _) = counting_action();
            binding
                .update(key("readiness"), Duration::from_secs(1), (), action)
                .unwrap();

            assert_eq!(binding.key().map(PollKey::as_str), Some("readiness"));
            assert_eq!(mock.register_calls(), 2);
            assert_eq!(mock.deregister_calls(), 1);
        }

        #[test]
        fn interval_change_resubscribes() {
            let mock = MockController::new();
            let mut binding: PollBinding =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);

            let (action, _) = counting_action();
            binding
                .update(key("containers"), Duration::from_secs(1), (), action)
                .unwrap();

            let (action, _) = counting_action();
            binding
                .update(key("containers"), Duration::from_secs(5), (), action)
                .unwrap();

            assert_eq!(mock.register_calls(), 2);
            assert_eq!(mock.deregister_calls(), 1);
        }

        #[test]
        fn drop_deregisters_once_despite_action_churn() {
            let mock = MockController::new();
            let mut binding: PollBinding =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);

            for _ in 0..10 {
                let (action, _) = counting_action();
                binding
                    .update(key("containers"), Duration::from_secs(1), (), action)
                    .unwrap();
            }

            drop(binding);
            assert_eq!(mock.register_calls(), 1);
            assert_eq!(mock.deregister_calls(), 1);
        }

        #[test]
        fn release_is_idempotent() {
            let mock = MockController::new();
            let mut binding: PollBinding =
                PollBinding::new(Arc::clone(&mock) as Arc<dyn PollController>);

            let (action, _) = counting_action();
            binding
                .update(key("containers"), Duration::from_secs(1), (), action)
                .unwrap();

            binding.release();
            binding.release();
            assert!(!binding.is_registered());

            drop(binding);
            assert_eq!(mock.deregister_calls(), 1);
        }

        #[test]
        fn failed_registration_leaves_binding_unregistered() {
            struct RejectingController;

            impl PollController for RejectingController {
                fn register(
                    &self,
                    _key: PollKey,
                    _action: FetchAction,
                    _interval: Duration,
                ) -> Result<PollTicket> {
                    Err(PollError::InvalidInterval {
                        reason: "rejected".to_string(),
                    })
                }

                fn deregister(&self, _ticket: PollTicket) {}
            }

            let mut binding: PollBinding = PollBinding::new(Arc::new(RejectingController));
            let (action, _) = counting_action();

            let result = binding.update(key("containers"), Duration::from_secs(1), (), action);
            assert!(result.is_err());
            assert!(!binding.is_registered());
        }

        #[tokio::test]
        async fn ticks_run_the_latest_action() {
            let registry = PollRegistry::new();
            let mut binding: PollBinding = PollBinding::with_registry(&registry);

            let (first, first_count) = counting_action();
            binding
                .update(key("containers"), Duration::from_millis(15), (), first)
                .unwrap();
            assert_eq!(first_count.load(Ordering::SeqCst), 1);

            // Swap the action without touching the registration.
            let (second, second_count) = counting_action();
            binding
                .update(key("containers"), Duration::from_millis(15), (), second)
                .unwrap();
            assert_eq!(registry.consumer_count(&key("containers")), 1);

            tokio::time::sleep(Duration::from_millis(120)).await;

            // All ticks after the swap hit the new action.
            assert_eq!(first_count.load(Ordering::SeqCst), 1);
            assert!(second_count.load(Ordering::SeqCst) >= 3);

            drop(binding);
            assert!(!registry.is_polling(&key("containers")));
        }
    }
}
