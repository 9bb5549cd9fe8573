//! In-process event registry.
//!
//! Fans each [`ChatEvent`] out to every handler subscribed to its
//! [`EventKind`]. Dispatch is synchronous.
//!
//! # Delivery rules
//!
//! - The handler list is copied before iterating, so subscribing or
//!   unsubscribing from inside a handler never disturbs the current pass.
//! - A handler whose subscription was cancelled is skipped, even if it was
//!   part of the copied list.
//! - A handler that returns an error or panics is logged and the pass
//!   continues with the remaining handlers.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::domain::chat::{ChatEvent, EventKind};
use crate::ports::{DispatchError, EventHandler, FnHandler};

/// Identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    active: AtomicBool,
}

#[derive(Default)]
struct RegistryInner {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<Entry>>>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, kind: EventKind, id: SubscriptionId) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = handlers.get_mut(&kind) {
            entries.retain(|entry| {
                if entry.id == id {
                    entry.active.store(false, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            });
            if entries.is_empty() {
                handlers.remove(&kind);
            }
        }
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Handlers that processed the event successfully.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Event-kind-keyed fan-out of chat events.
///
/// Cheap to clone; clones share the same subscriber lists.
#[derive(Clone, Default)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one event kind.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let entry = Arc::new(Entry {
            id,
            handler,
            active: AtomicBool::new(true),
        });
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push(entry);

        tracing::trace!(kind = %kind, subscription = id.0, "Subscribed");
        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Registers a closure for one event kind.
    pub fn on<F>(&self, kind: EventKind, name: &'static str, f: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnHandler::new(name, f)))
    }

    /// Registers the same handler for several kinds.
    pub fn subscribe_all(
        &self,
        kinds: &[EventKind],
        handler: Arc<dyn EventHandler>,
    ) -> Vec<Subscription> {
        kinds
            .iter()
            .map(|kind| self.subscribe(*kind, Arc::clone(&handler)))
            .collect()
    }

    /// Delivers an event to every handler currently registered for its kind.
    pub fn dispatch(&self, event: &ChatEvent) -> DispatchOutcome {
        let kind = event.kind();

        // Copy the list so the lock is released before any handler runs
        let entries: Vec<Arc<Entry>> = {
            let handlers = self.inner.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&kind).cloned().unwrap_or_default()
        };

        let mut outcome = DispatchOutcome::default();
        for entry in entries {
            if !entry.active.load(Ordering::SeqCst) {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| entry.handler.handle(event)));
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(DispatchError::new(
                    entry.handler.name(),
                    kind,
                    panic_message(payload.as_ref()),
                )),
            };

            match failure {
                None => outcome.delivered += 1,
                Some(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        handler = entry.handler.name(),
                        kind = %kind,
                        error = %e,
                        "Event handler failed"
                    );
                }
            }
        }
        outcome
    }

    /// Number of handlers registered for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Handle returned by [`EventRegistry::subscribe`].
///
/// Dropping it unsubscribes the handler.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes the handler. It receives no event after this returns.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(self.kind, self.id);
            tracing::trace!(kind = %self.kind, subscription = self.id.0, "Unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::{ConnectionState, TransportErrorEvent};
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn connected() -> ChatEvent {
        ChatEvent::ConnectionChanged(ConnectionState::Connected)
    }

    fn error_event() -> ChatEvent {
        ChatEvent::TransportError(TransportErrorEvent {
            message: "Chat not found".to_string(),
        })
    }

    fn counter(registry: &EventRegistry, kind: EventKind) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = registry.on(kind, "counter", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn handler_receives_dispatched_event() {
        let registry = EventRegistry::new();
        let (count, _sub) = counter(&registry, EventKind::ConnectionChanged);

        let outcome = registry.dispatch(&connected());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.delivered, 1);
    }

    #[test]
    fn multiple_handlers_all_invoked_once() {
        let registry = EventRegistry::new();
        let (a, _sa) = counter(&registry, EventKind::ConnectionChanged);
        let (b, _sb) = counter(&registry, EventKind::ConnectionChanged);
        let (c, _sc) = counter(&registry, EventKind::ConnectionChanged);

        registry.dispatch(&connected());

        for count in [a, b, c] {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn other_kinds_are_not_delivered() {
        let registry = EventRegistry::new();
        let (count, _sub) = counter(&registry, EventKind::NewMessage);

        registry.dispatch(&connected());

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = EventRegistry::new();
        let (count, sub) = counter(&registry, EventKind::ConnectionChanged);

        registry.dispatch(&connected());
        sub.unsubscribe();
        registry.dispatch(&connected());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.handler_count(EventKind::ConnectionChanged), 0);
    }

    #[test]
    fn subscribe_all_registers_for_each_kind() {
        let registry = EventRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnHandler::new("all", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        let _subs = registry.subscribe_all(
            &[EventKind::ConnectionChanged, EventKind::TransportError],
            handler,
        );
        registry.dispatch(&connected());
        registry.dispatch(&error_event());

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        struct Failing;

        impl EventHandler for Failing {
            fn handle(&self, event: &ChatEvent) -> Result<(), DispatchError> {
                Err(DispatchError::new(self.name(), event.kind(), "nope"))
            }
            fn name(&self) -> &'static str {
                "Failing"
            }
        }

        let registry = EventRegistry::new();
        let _failing = registry.subscribe(EventKind::ConnectionChanged, Arc::new(Failing));
        let (count, _sub) = counter(&registry, EventKind::ConnectionChanged);

        let outcome = registry.dispatch(&connected());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(outcome, DispatchOutcome { delivered: 1, failed: 1 });
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let registry = EventRegistry::new();
        let _panicking = registry.on(EventKind::ConnectionChanged, "panicking", |_| {
            panic!("handler bug");
        });
        let (count, _sub) = counter(&registry, EventKind::ConnectionChanged);

        let outcome = registry.dispatch(&connected());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn unsubscribing_a_peer_during_dispatch_keeps_other_handlers() {
        let registry = EventRegistry::new();
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = victim_slot.clone();
        let _killer = registry.on(EventKind::ConnectionChanged, "killer", move |_| {
            if let Some(sub) = slot.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        let (victim, victim_sub) = counter(&registry, EventKind::ConnectionChanged);
        *victim_slot.lock().unwrap() = Some(victim_sub);
        let (bystander, _b) = counter(&registry, EventKind::ConnectionChanged);

        registry.dispatch(&connected());

        assert_eq!(victim.load(Ordering::SeqCst), 0);
        assert_eq!(bystander.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribing_during_dispatch_takes_effect_next_pass() {
        let registry = EventRegistry::new();
        let late_count = Arc::new(AtomicUsize::new(0));
        let late_subs: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let reg = registry.clone();
        let lc = late_count.clone();
        let subs = late_subs.clone();
        let _adder = registry.on(EventKind::ConnectionChanged, "adder", move |_| {
            let lc = lc.clone();
            let sub = reg.on(EventKind::ConnectionChanged, "late", move |_| {
                lc.fetch_add(1, Ordering::SeqCst);
            });
            subs.lock().unwrap().push(sub);
        });

        registry.dispatch(&connected());
        assert_eq!(late_count.load(Ordering::SeqCst), 0);

        registry.dispatch(&connected());
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_outliving_registry_drops_cleanly() {
        let registry = EventRegistry::new();
        let (_count, sub) = counter(&registry, EventKind::ConnectionChanged);
        drop(registry);
        sub.unsubscribe();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe,
        Unsubscribe(usize),
        Dispatch,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Subscribe),
            (0usize..8).prop_map(Op::Unsubscribe),
            Just(Op::Dispatch),
        ]
    }

    proptest! {
        #[test]
        fn handlers_see_exactly_the_dispatches_while_subscribed(ops in prop::collection::vec(op(), 0..60)) {
            let registry = EventRegistry::new();
            let mut live: Vec<(usize, Subscription)> = Vec::new();
            let mut counts: Vec<Arc<AtomicUsize>> = Vec::new();
            let mut expected: Vec<usize> = Vec::new();

            for op in ops {
                match op {
                    Op::Subscribe => {
                        let (count, sub) = counter(&registry, EventKind::ConnectionChanged);
                        live.push((counts.len(), sub));
                        counts.push(count);
                        expected.push(0);
                    }
                    Op::Unsubscribe(i) => {
                        if !live.is_empty() {
                            let (_, sub) = live.remove(i % live.len());
                            sub.unsubscribe();
                        }
                    }
                    Op::Dispatch => {
                        registry.dispatch(&connected());
                        for (index, _) in &live {
                            expected[*index] += 1;
                        }
                    }
                }
            }

            for (count, want) in counts.iter().zip(expected) {
                prop_assert_eq!(count.load(Ordering::SeqCst), want);
            }
        }
    }
}
