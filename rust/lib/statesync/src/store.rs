use std::sync::{Arc, Mutex};

use crate::lock;
use crate::queue::DeliveryQueue;
use crate::value::{State, StateMap};

/// Callback type for state change notifications.
///
/// Handlers are identified by `Arc` pointer: subscribing a clone of the
/// same `Arc` twice is a no-op, and unsubscribing needs a clone of the
/// `Arc` that was subscribed.
pub type StateHandler = Arc<dyn Fn(&State) + Send + Sync>;

/// Immutable-snapshot state container with change notification.
///
/// - `set(partial)` shallow-merges into a new snapshot and always notifies.
/// - `reset()` restores the initial snapshot, notifying only if the current
///   snapshot is not already the initial one.
/// - `subscribe(handler)` / `unsubscribe(handler)` manage an ordered,
///   duplicate-free handler list.
///
/// # Re-entrancy
///
/// Notifications flow through a FIFO queue. A `set` or `reset` issued from
/// inside a handler updates `state()` immediately, but its notification is
/// delivered only after the in-flight one has reached every subscriber. So
/// every subscriber sees snapshots in mutation order, never nested.
pub struct ObservableStore {
    /// Frozen at construction, never replaced.
    initial: State,
    inner: Mutex<Inner>,
    notifications: DeliveryQueue<State>,
}

struct Inner {
    current: State,
    /// Insertion order = notification order.
    handlers: Vec<StateHandler>,
}

impl ObservableStore {
    /// Create a store whose initial and current state is `initial`.
    pub fn new(initial: StateMap) -> Self {
        let initial = State::new(initial);
        Self {
            inner: Mutex::new(Inner {
                current: initial.clone(),
                handlers: Vec::new(),
            }),
            initial,
            notifications: DeliveryQueue::new(),
        }
    }

    /// Current snapshot (Arc clone, cheap).
    pub fn state(&self) -> State {
        lock(&self.inner).current.clone()
    }

    /// The snapshot captured at construction.
    pub fn initial_state(&self) -> State {
        self.initial.clone()
    }

    /// Merge `partial` over the current state and notify subscribers.
    ///
    /// There is no dirty-checking: an empty or identical `partial` still
    /// produces a new snapshot and a notification.
    pub fn set(&self, partial: StateMap) {
        let must_drain = {
            let mut inner = lock(&self.inner);
            let next = inner.current.merged(&partial);
            inner.current = next.clone();
            self.notifications.enqueue(next)
        };
        if must_drain {
            self.notify();
        }
    }

    /// Restore the initial snapshot.
    ///
    /// No-op (and no notification) when already at the initial snapshot.
    pub fn reset(&self) {
        let must_drain = {
            let mut inner = lock(&self.inner);
            if inner.current.ptr_eq(&self.initial) {
                return;
            }
            inner.current = self.initial.clone();
            self.notifications.enqueue(self.initial.clone())
        };
        if must_drain {
            self.notify();
        }
    }

    /// Register a handler. Already-registered handlers are ignored.
    pub fn subscribe(&self, handler: StateHandler) {
        let mut inner = lock(&self.inner);
        if !inner.handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            inner.handlers.push(handler);
        }
    }

    /// Remove a handler. Unknown handlers are ignored.
    pub fn unsubscribe(&self, handler: &StateHandler) {
        let mut inner = lock(&self.inner);
        inner.handlers.retain(|h| !Arc::ptr_eq(h, handler));
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }

    fn is_subscribed(&self, handler: &StateHandler) -> bool {
        lock(&self.inner)
            .handlers
            .iter()
            .any(|h| Arc::ptr_eq(h, handler))
    }

    fn notify(&self) {
        self.notifications.drain(|state| {
            let handlers = lock(&self.inner).handlers.clone();
            for handler in &handlers {
                // Skip handlers removed earlier in this round.
                if self.is_subscribed(handler) {
                    handler(&state);
                }
            }
        });
    }
}

impl Default for ObservableStore {
    fn default() -> Self {
        Self::new(StateMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn map(value: Value) -> StateMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn counter() -> (Arc<AtomicU64>, StateHandler) {
        let count = Arc::new(AtomicU64::new(0));
        let count_c = count.clone();
        let handler: StateHandler = Arc::new(move |_: &State| {
            count_c.fetch_add(1, Ordering::Relaxed);
        });
        (count, handler)
    }

    fn recorder() -> (Arc<RwLock<Vec<Value>>>, StateHandler) {
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_c = seen.clone();
        let handler: StateHandler = Arc::new(move |state: &State| {
            seen_c.write().unwrap().push(state.to_value());
        });
        (seen, handler)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn new_uses_initial_as_current() {
        let store = ObservableStore::new(map(json!({"count": 0})));
        assert_eq!(store.state().to_value(), json!({"count": 0}));
        assert!(store.state().ptr_eq(&store.initial_state()));
    }

    #[test]
    fn default_is_empty() {
        let store = ObservableStore::default();
        assert!(store.state().is_empty());
        assert_eq!(store.subscriber_count(), 0);
    }

    // ========================================================================
    // set
    // ========================================================================

    #[test]
    fn set_replaces_only_given_keys() {
        let store = ObservableStore::new(map(json!({"a": 1, "b": 2})));
        store.set(map(json!({"b": 3})));
        assert_eq!(store.state().to_value(), json!({"a": 1, "b": 3}));
    }

    #[test]
    fn set_always_notifies() {
        let store = ObservableStore::new(map(json!({"a": 1})));
        let (count, handler) = counter();
        store.subscribe(handler);

        store.set(map(json!({"a": 1})));
        store.set(StateMap::new());
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn set_notifies_with_new_snapshot() {
        let store = ObservableStore::new(map(json!({"count": 0})));
        let (seen, handler) = recorder();
        store.subscribe(handler);

        store.set(map(json!({"count": 1})));
        store.set(map(json!({"count": 2})));

        assert_eq!(
            *seen.read().unwrap(),
            vec![json!({"count": 1}), json!({"count": 2})]
        );
    }

    #[test]
    fn earlier_snapshots_are_not_mutated() {
        let store = ObservableStore::new(map(json!({"count": 0})));
        let before = store.state();
        store.set(map(json!({"count": 5})));

        assert_eq!(before.to_value(), json!({"count": 0}));
    }

    // ========================================================================
    // reset
    // ========================================================================

    #[test]
    fn reset_restores_initial() {
        let store = ObservableStore::new(map(json!({"count": 0})));
        store.set(map(json!({"count": 3, "extra": true})));
        store.reset();

        assert_eq!(store.state().to_value(), json!({"count": 0}));
        assert!(store.state().ptr_eq(&store.initial_state()));
    }

    #[test]
    fn reset_is_idempotent() {
        let store = ObservableStore::new(map(json!({"count": 0})));
        let (count, handler) = counter();
        store.set(map(json!({"count": 1})));
        store.subscribe(handler);

        store.reset();
        store.reset();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reset_on_fresh_store_is_silent() {
        let store = ObservableStore::new(map(json!({"count": 0})));
        let (count, handler) = counter();
        store.subscribe(handler);

        store.reset();
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn reset_after_noop_set_still_notifies() {
        // Structurally equal but a different snapshot: reset must fire.
        let store = ObservableStore::new(map(json!({"count": 0})));
        let (count, handler) = counter();
        store.set(map(json!({"count": 0})));
        store.subscribe(handler);

        store.reset();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn initial_state_survives_any_sequence() {
        let original = map(json!({"count": 0, "nested": {"x": 1}}));
        let store = ObservableStore::new(original.clone());

        store.set(map(json!({"count": 1})));
        store.set(map(json!({"nested": {"x": 2}})));
        store.reset();
        store.set(map(json!({"other": "y"})));
        store.reset();

        assert_eq!(*store.initial_state(), original);
        assert_eq!(*store.state(), original);
    }

    // ========================================================================
    // subscribe / unsubscribe
    // ========================================================================

    #[test]
    fn duplicate_subscribe_notifies_once() {
        let store = ObservableStore::default();
        let (count, handler) = counter();
        store.subscribe(handler.clone());
        store.subscribe(handler);

        assert_eq!(store.subscriber_count(), 1);
        store.set(map(json!({"a": 1})));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = ObservableStore::default();
        let (count, handler) = counter();
        store.subscribe(handler.clone());

        store.set(map(json!({"a": 1})));
        store.unsubscribe(&handler);
        store.set(map(json!({"a": 2})));

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_unknown_is_noop() {
        let store = ObservableStore::default();
        let (_count, handler) = counter();
        // Should not panic.
        store.unsubscribe(&handler);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn notification_follows_subscription_order() {
        let store = ObservableStore::default();
        let order = Arc::new(RwLock::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order_c = order.clone();
            let handler: StateHandler = Arc::new(move |_: &State| {
                order_c.write().unwrap().push(tag);
            });
            store.subscribe(handler);
        }

        store.set(map(json!({"a": 1})));
        assert_eq!(*order.read().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_during_notification() {
        let store = Arc::new(ObservableStore::default());
        let (late_count, late) = counter();

        // The first handler removes the second before it runs.
        let store_c = store.clone();
        let late_c = late.clone();
        let remover: StateHandler = Arc::new(move |_: &State| {
            store_c.unsubscribe(&late_c);
        });

        store.subscribe(remover);
        store.subscribe(late);

        store.set(map(json!({"a": 1})));
        store.set(map(json!({"a": 2})));
        assert_eq!(late_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn handler_can_unsubscribe_itself() {
        let store = Arc::new(ObservableStore::default());
        let count = Arc::new(AtomicU64::new(0));
        let slot: Arc<RwLock<Option<StateHandler>>> = Arc::new(RwLock::new(None));

        let store_c = store.clone();
        let slot_c = slot.clone();
        let count_c = count.clone();
        let handler: StateHandler = Arc::new(move |_: &State| {
            count_c.fetch_add(1, Ordering::Relaxed);
            if let Some(me) = slot_c.read().unwrap().as_ref() {
                store_c.unsubscribe(me);
            }
        });
        *slot.write().unwrap() = Some(handler.clone());
        store.subscribe(handler);

        store.set(map(json!({"a": 1})));
        store.set(map(json!({"a": 2})));
        assert_eq!(count.load(Ordering::Relaxed), 1);
        // Break the Arc cycle.
        slot.write().unwrap().take();
    }

    // ========================================================================
    // Re-entrancy
    // ========================================================================

    #[test]
    fn nested_set_is_delivered_after_outer_notification() {
        let store = Arc::new(ObservableStore::new(map(json!({"count": 0}))));
        let log = Arc::new(RwLock::new(Vec::new()));

        let store_c = store.clone();
        let log_c = log.clone();
        let bumper: StateHandler = Arc::new(move |state: &State| {
            log_c.write().unwrap().push(format!("a:{}", state["count"]));
            if state["count"] == json!(1) {
                store_c.set(map(json!({"count": 2})));
                // The nested write is visible right away.
                assert_eq!(store_c.state()["count"], json!(2));
            }
        });
        let log_c = log.clone();
        let watcher: StateHandler = Arc::new(move |state: &State| {
            log_c.write().unwrap().push(format!("b:{}", state["count"]));
        });

        store.subscribe(bumper);
        store.subscribe(watcher);
        store.set(map(json!({"count": 1})));

        assert_eq!(*log.read().unwrap(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn nested_reset_is_queued() {
        let store = Arc::new(ObservableStore::new(map(json!({"count": 0}))));
        let (seen, rec) = recorder();

        let store_c = store.clone();
        let resetter: StateHandler = Arc::new(move |state: &State| {
            if state["count"] == json!(9) {
                store_c.reset();
            }
        });
        store.subscribe(resetter);
        store.subscribe(rec);

        store.set(map(json!({"count": 9})));
        assert_eq!(
            *seen.read().unwrap(),
            vec![json!({"count": 9}), json!({"count": 0})]
        );
    }

    #[test]
    fn panicking_handler_does_not_wedge_the_queue() {
        let store = Arc::new(ObservableStore::default());
        let panicky: StateHandler = Arc::new(|state: &State| {
            if state.contains_key("boom") {
                panic!("handler failure");
            }
        });
        let (count, handler) = counter();
        store.subscribe(panicky);
        store.subscribe(handler);

        let store_c = store.clone();
        let result = std::thread::spawn(move || store_c.set(map(json!({"boom": 1})))).join();
        assert!(result.is_err());

        store.set(map(json!({"ok": 1})));
        // Only the `ok` round reached it; the panicked round is not redelivered.
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    // ========================================================================
    // Thread safety
    // ========================================================================

    #[test]
    fn concurrent_reads_during_writes() {
        use std::thread;

        let store = Arc::new(ObservableStore::new(map(json!({"count": 0}))));
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    store.set(map(json!({"count": i})));
                }
            })
        };
        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    assert!(store.state().contains_key("count"));
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(store.state()["count"], json!(499));
    }

    // Compile-time: the store must be shareable across threads.
    fn _assert_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<ObservableStore>();
        assert_sync::<ObservableStore>();
    }
}
