//! statesync: live state mirroring between a producer and an observer panel.
//!
//! A producer renders against an [`ObservableStore`]. Its
//! [`ProducerBinding`] republishes every snapshot on a [`SyncChannel`]; the
//! observer's [`ConsumerBinding`] displays the latest one and can ask the
//! producer to reset. The two sides share nothing but the channel.
//!
//! # Topics
//!
//! - `<ns>/state/change`: producer → consumer, `{"state": {..} | null}`
//! - `<ns>/state/reset`: consumer → producer, no payload
//!
//! # Example
//!
//! ```ignore
//! use statesync::{ChannelTopics, ConsumerBinding, Factory, MemoryChannel, RenderResult};
//!
//! let channel = MemoryChannel::global();
//! let topics = ChannelTopics::new("demo")?;
//!
//! let panel = ConsumerBinding::mount(channel.clone(), topics.clone());
//! let factory = Factory::new(channel, topics);
//!
//! let counter = factory.with_state(initial, |args| {
//!     RenderResult::Element(format!("{}", args.store().state()["count"]))
//! });
//! let view = counter.call();          // panel now shows {"count": 0}
//! view.store().set(partial);          // panel follows
//! panel.request_reset();              // store returns to {"count": 0}
//! drop(view);                         // panel goes idle
//! ```

pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod factory;
pub mod panel;
pub mod producer;
pub mod protocol;
mod queue;
pub mod store;
pub mod trie;
pub mod value;

// Re-export primary types at crate root.
pub use channel::{MemoryChannel, MessageHandler, SyncChannel};
pub use config::SyncConfig;
pub use consumer::{ConsumerBinding, DisplayState};
pub use error::SyncError;
pub use factory::{
    BoundContext, Decorated, Decorator, Factory, RenderArgs, RenderResult, ScopeKey, StateView,
    StoreRegistry, StoreScope, StoryContext, StoryDecorator, StoryThunk,
};
pub use panel::{PanelHost, PanelProps, PanelRegistry, PanelView, StatePanel};
pub use producer::ProducerBinding;
pub use protocol::{ChangeEvent, ChannelTopics};
pub use store::{ObservableStore, StateHandler};
pub use value::{State, StateMap, SubscriptionId};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Handlers run without locks held, so a poisoned lock only means a panic
// elsewhere; the data is still consistent.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
