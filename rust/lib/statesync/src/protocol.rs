//! Wire contract between a producer and the observer panel.
//!
//! | Topic                 | Direction           | Payload                     |
//! |-----------------------|---------------------|-----------------------------|
//! | `<ns>/state/change`   | producer → consumer | `{"state": {..} \| null}`   |
//! | `<ns>/state/reset`    | consumer → producer | `null`                      |
//!
//! A change message always carries the full snapshot, never a delta.
//! `"state": null` means the producer has been torn down.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::SyncError;
use crate::value::State;

/// Namespace used when no configuration overrides it.
pub const DEFAULT_NAMESPACE: &str = "statesync";

/// The topic pair for one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTopics {
    namespace: String,
    change: String,
    reset: String,
}

impl ChannelTopics {
    /// Build the topics for `namespace`.
    ///
    /// The namespace is one or more `/`-separated levels. Empty levels and
    /// the wildcard characters `+` and `#` are rejected so that a namespace
    /// can never match another namespace's traffic.
    pub fn new(namespace: &str) -> Result<Self, SyncError> {
        validate_namespace(namespace)?;
        Ok(Self::build(namespace))
    }

    fn build(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            change: format!("{namespace}/state/change"),
            reset: format!("{namespace}/state/reset"),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Producer → consumer snapshot topic.
    pub fn change(&self) -> &str {
        &self.change
    }

    /// Consumer → producer reset topic.
    pub fn reset(&self) -> &str {
        &self.reset
    }

    /// Identifier the observer panel is registered under.
    pub fn panel_id(&self) -> String {
        format!("{}/state/panel", self.namespace)
    }
}

impl Default for ChannelTopics {
    fn default() -> Self {
        Self::build(DEFAULT_NAMESPACE)
    }
}

fn validate_namespace(namespace: &str) -> Result<(), SyncError> {
    let invalid = |reason| SyncError::InvalidNamespace {
        namespace: namespace.to_string(),
        reason,
    };
    if namespace.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if namespace.split('/').any(str::is_empty) {
        return Err(invalid("must not contain empty levels"));
    }
    if namespace.contains(['+', '#']) {
        return Err(invalid("must not contain wildcards"));
    }
    Ok(())
}

/// Payload of the change topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub state: Option<State>,
}

impl ChangeEvent {
    /// A live snapshot.
    pub fn snapshot(state: State) -> Self {
        Self { state: Some(state) }
    }

    /// The producer is gone.
    pub fn gone() -> Self {
        Self { state: None }
    }

    pub fn to_payload(&self) -> Value {
        json!({ "state": self.state.as_ref().map(State::to_value) })
    }

    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }
}

/// Payload of the reset topic.
pub fn reset_payload() -> Value {
    Value::Null
}
