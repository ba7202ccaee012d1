use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;
use tracing::trace;

use crate::queue::DeliveryQueue;
use crate::trie::TopicTrie;
use crate::value::SubscriptionId;
use crate::{read, write};

/// Callback type for channel messages: `(topic, payload)`.
pub type MessageHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Named-event publish/subscribe bus shared by the producer and consumer
/// contexts.
///
/// Fire-and-forget: no acknowledgement, no request/response. Messages on
/// one topic are delivered in publish order.
pub trait SyncChannel: Send + Sync {
    /// Publish `payload` to every handler subscribed to `topic`.
    fn publish(&self, topic: &str, payload: Value);

    /// Subscribe to a topic pattern. Returns a handle for `unsubscribe`.
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, topic: &str, id: SubscriptionId);
}

/// In-process [`SyncChannel`].
///
/// - Topics are routed through a [`TopicTrie`], so subscriptions may use
///   `+` / `#` wildcards (e.g. a debug tap on `ns/#`).
/// - Delivery is synchronous and reliable. A publish made from inside a
///   handler is queued and delivered after the current message has
///   reached all of its handlers, keeping per-topic FIFO order.
/// - A subscription removed mid-delivery receives nothing further.
pub struct MemoryChannel {
    registry: RwLock<Registry>,
    outbox: DeliveryQueue<(String, Value)>,
    next_id: AtomicU64,
}

struct Registry {
    trie: TopicTrie<Entry>,
    live: HashSet<SubscriptionId>,
}

#[derive(Clone)]
struct Entry {
    id: SubscriptionId,
    handler: MessageHandler,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry {
                trie: TopicTrie::new(),
                live: HashSet::new(),
            }),
            outbox: DeliveryQueue::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide channel shared by every context in this process.
    pub fn global() -> Arc<MemoryChannel> {
        static GLOBAL: OnceLock<Arc<MemoryChannel>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(MemoryChannel::new())).clone()
    }

    /// Number of live subscriptions across all topics.
    pub fn subscriber_count(&self) -> usize {
        read(&self.registry).live.len()
    }

    /// Number of live subscriptions that would receive a message on `topic`.
    pub fn listeners(&self, topic: &str) -> usize {
        read(&self.registry).trie.match_topic(topic).len()
    }

    fn deliver(&self, topic: &str, payload: &Value) {
        let entries = read(&self.registry).trie.match_topic(topic);
        trace!(topic, listeners = entries.len(), "deliver");
        for entry in entries {
            if read(&self.registry).live.contains(&entry.id) {
                (entry.handler)(topic, payload);
            }
        }
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncChannel for MemoryChannel {
    fn publish(&self, topic: &str, payload: Value) {
        if self.outbox.enqueue((topic.to_string(), payload)) {
            self.outbox
                .drain(|(topic, payload)| self.deliver(&topic, &payload));
        }
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut registry = write(&self.registry);
        registry.trie.insert(topic, Entry { id, handler });
        registry.live.insert(id);
        trace!(topic, ?id, "subscribe");
        id
    }

    fn unsubscribe(&self, topic: &str, id: SubscriptionId) {
        let mut registry = write(&self.registry);
        if registry.trie.remove(topic, |entry| entry.id == id) > 0 {
            registry.live.remove(&id);
            trace!(topic, ?id, "unsubscribe");
        }
    }
}
