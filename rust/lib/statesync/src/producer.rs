use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::channel::{MessageHandler, SyncChannel};
use crate::protocol::{ChangeEvent, ChannelTopics};
use crate::store::{ObservableStore, StateHandler};
use crate::value::{State, SubscriptionId};

/// Keeps one store mirrored onto a channel namespace for the lifetime of
/// one rendering of the producer.
///
/// Mounting is construction: [`ProducerBinding::mount`] wires the store and
/// reset subscriptions, then announces the current state once. Unmounting
/// (explicitly or on drop) removes both subscriptions and announces
/// `{"state": null}`. A binding never mounts again; a new render mounts a
/// new binding.
pub struct ProducerBinding {
    store: Arc<ObservableStore>,
    channel: Arc<dyn SyncChannel>,
    topics: ChannelTopics,
    phase: Phase,
}

enum Phase {
    Mounted {
        on_change: StateHandler,
        on_reset: SubscriptionId,
    },
    Unmounted,
}

impl ProducerBinding {
    pub fn mount(
        store: Arc<ObservableStore>,
        channel: Arc<dyn SyncChannel>,
        topics: ChannelTopics,
    ) -> Self {
        let on_change: StateHandler = {
            let channel = channel.clone();
            let topic = topics.change().to_string();
            Arc::new(move |state: &State| {
                channel.publish(&topic, ChangeEvent::snapshot(state.clone()).to_payload());
            })
        };
        store.subscribe(on_change.clone());

        let on_reset: MessageHandler = {
            let store = store.clone();
            Arc::new(move |topic: &str, _: &Value| {
                debug!(topic, "reset requested");
                store.reset();
            })
        };
        let on_reset = channel.subscribe(topics.reset(), on_reset);

        // Initial sync, after both subscriptions are live.
        channel.publish(
            topics.change(),
            ChangeEvent::snapshot(store.state()).to_payload(),
        );
        debug!(namespace = topics.namespace(), "producer mounted");

        Self {
            store,
            channel,
            topics,
            phase: Phase::Mounted {
                on_change,
                on_reset,
            },
        }
    }

    /// Tear down. Idempotent.
    pub fn unmount(&mut self) {
        let Phase::Mounted {
            on_change,
            on_reset,
        } = std::mem::replace(&mut self.phase, Phase::Unmounted)
        else {
            return;
        };
        self.store.unsubscribe(&on_change);
        self.channel.unsubscribe(self.topics.reset(), on_reset);
        self.channel
            .publish(self.topics.change(), ChangeEvent::gone().to_payload());
        debug!(namespace = self.topics.namespace(), "producer unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.phase, Phase::Mounted { .. })
    }

    pub fn store(&self) -> &Arc<ObservableStore> {
        &self.store
    }

    pub fn topics(&self) -> &ChannelTopics {
        &self.topics
    }
}

impl Drop for ProducerBinding {
    fn drop(&mut self) {
        self.unmount();
    }
}
