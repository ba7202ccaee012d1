use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// The mapping type carried inside a [`State`] snapshot.
pub type StateMap = Map<String, Value>;

/// An immutable, reference-counted state snapshot.
///
/// Wraps `Arc<Map<String, Value>>`. The map is only ever reachable through
/// a shared reference, so a published snapshot can never change in place;
/// every mutation builds a new `State`. Clone is cheap, just an atomic
/// increment.
///
/// Equality is structural. Use [`State::ptr_eq`] for identity.
#[derive(Clone, Default, PartialEq)]
pub struct State {
    inner: Arc<StateMap>,
}

impl State {
    /// Freeze a mapping into a snapshot.
    pub fn new(map: StateMap) -> Self {
        Self {
            inner: Arc::new(map),
        }
    }

    /// Build a snapshot from a JSON value.
    ///
    /// Returns `None` unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map)),
            _ => None,
        }
    }

    /// Shallow merge: keys in `partial` overwrite, all others are kept.
    ///
    /// `self` is untouched; the result is a fresh snapshot.
    pub fn merged(&self, partial: &StateMap) -> Self {
        let mut map = (*self.inner).clone();
        for (key, value) in partial {
            map.insert(key.clone(), value.clone());
        }
        Self::new(map)
    }

    /// Whether both snapshots are the same allocation.
    pub fn ptr_eq(&self, other: &State) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy the snapshot out as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object((*self.inner).clone())
    }
}

impl Deref for State {
    type Target = StateMap;

    fn deref(&self) -> &StateMap {
        &self.inner
    }
}

impl From<StateMap> for State {
    fn from(map: StateMap) -> Self {
        Self::new(map)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (*self.inner).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StateMap::deserialize(deserializer).map(Self::new)
    }
}

/// Unique handle for a channel subscription, returned by
/// `SyncChannel::subscribe()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
