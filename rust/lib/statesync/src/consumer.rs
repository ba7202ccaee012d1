use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::{MessageHandler, SyncChannel};
use crate::protocol::{ChangeEvent, ChannelTopics, reset_payload};
use crate::value::{State, SubscriptionId};
use crate::{lock, read, write};

/// What the observer currently knows about the producer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayState {
    /// No producer, or it has gone away.
    #[default]
    Idle,
    /// Latest snapshot announced by the producer.
    Showing(State),
}

impl DisplayState {
    pub fn snapshot(&self) -> Option<&State> {
        match self {
            DisplayState::Idle => None,
            DisplayState::Showing(state) => Some(state),
        }
    }
}

/// Observer-side half of the protocol.
///
/// Listens on the change topic and keeps the last announced snapshot,
/// replacing it wholesale on every message. Reset requests go out on the
/// reset topic; the resulting state arrives later as an ordinary change
/// message.
///
/// All methods take `&self` and no lock is held while publishing, so a
/// change handler on the same thread may call back into the binding.
pub struct ConsumerBinding {
    channel: Arc<dyn SyncChannel>,
    topics: ChannelTopics,
    display: Arc<RwLock<DisplayState>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl ConsumerBinding {
    pub fn mount(channel: Arc<dyn SyncChannel>, topics: ChannelTopics) -> Self {
        let display = Arc::new(RwLock::new(DisplayState::Idle));

        let on_change: MessageHandler = {
            let display = display.clone();
            Arc::new(move |topic: &str, payload: &Value| {
                match ChangeEvent::from_payload(payload) {
                    Ok(ChangeEvent { state: Some(state) }) => {
                        *write(&display) = DisplayState::Showing(state);
                    }
                    Ok(ChangeEvent { state: None }) => {
                        *write(&display) = DisplayState::Idle;
                    }
                    Err(e) => warn!(topic, error = %e, "ignoring malformed change payload"),
                }
            })
        };
        let subscription = channel.subscribe(topics.change(), on_change);
        debug!(namespace = topics.namespace(), "consumer mounted");

        Self {
            channel,
            topics,
            display,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Latest known display state.
    pub fn display(&self) -> DisplayState {
        read(&self.display).clone()
    }

    /// Latest snapshot, if a producer is live.
    pub fn state(&self) -> Option<State> {
        read(&self.display).snapshot().cloned()
    }

    /// Ask the producer to return to its initial state.
    ///
    /// Fire-and-forget. Does nothing once unmounted.
    pub fn request_reset(&self) {
        if !self.is_mounted() {
            return;
        }
        debug!(namespace = self.topics.namespace(), "reset requested");
        self.channel.publish(self.topics.reset(), reset_payload());
    }

    /// Stop listening. Idempotent.
    pub fn unmount(&self) {
        let taken = lock(&self.subscription).take();
        if let Some(id) = taken {
            self.channel.unsubscribe(self.topics.change(), id);
            debug!(namespace = self.topics.namespace(), "consumer unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    pub fn topics(&self) -> &ChannelTopics {
        &self.topics
    }
}

impl Drop for ConsumerBinding {
    fn drop(&mut self) {
        self.unmount();
    }
}
