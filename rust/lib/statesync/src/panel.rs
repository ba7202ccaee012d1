//! The observer panel and its registration with the host.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::channel::SyncChannel;
use crate::consumer::ConsumerBinding;
use crate::protocol::ChannelTopics;
use crate::value::State;

/// Title used when no configuration overrides it.
pub const DEFAULT_PANEL_TITLE: &str = "State";

/// Props the host passes on every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelProps {
    /// Whether the panel is the focused surface.
    pub active: bool,
}

/// What the panel draws: the snapshot, read-only, plus a reset control.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub state: State,
    pub reset_control: bool,
}

impl fmt::Display for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self.state).map_err(|_| fmt::Error)?;
        writeln!(f, "{json}")?;
        if self.reset_control {
            writeln!(f, "[ Reset ]")?;
        }
        Ok(())
    }
}

/// Side panel mirroring the producer's state.
pub struct StatePanel {
    title: String,
    consumer: ConsumerBinding,
}

impl StatePanel {
    pub fn mount(channel: Arc<dyn SyncChannel>, topics: ChannelTopics, title: &str) -> Self {
        Self {
            title: title.to_string(),
            consumer: ConsumerBinding::mount(channel, topics),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Nothing while idle or inactive; otherwise the snapshot and the
    /// reset control.
    pub fn render(&self, props: PanelProps) -> Option<PanelView> {
        if !props.active {
            return None;
        }
        let state = self.consumer.state()?;
        Some(PanelView {
            state,
            reset_control: true,
        })
    }

    /// The reset control was pressed.
    pub fn press_reset(&self) {
        self.consumer.request_reset();
    }

    pub fn unmount(&self) {
        self.consumer.unmount();
    }
}

/// Registration seam to the host's panel mechanism.
pub trait PanelHost {
    fn add_panel(&mut self, id: String, panel: Arc<StatePanel>);
}

/// Mount a [`StatePanel`] for `topics` and hand it to the host under
/// `<ns>/state/panel`.
pub fn register(
    host: &mut dyn PanelHost,
    channel: Arc<dyn SyncChannel>,
    topics: ChannelTopics,
    title: &str,
) -> Arc<StatePanel> {
    let id = topics.panel_id();
    let panel = Arc::new(StatePanel::mount(channel, topics, title));
    info!(%id, title, "registering state panel");
    host.add_panel(id, panel.clone());
    panel
}

/// Minimal in-memory [`PanelHost`].
#[derive(Default)]
pub struct PanelRegistry {
    panels: BTreeMap<String, Arc<StatePanel>>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<StatePanel>> {
        self.panels.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.panels.keys().cloned().collect()
    }
}

impl PanelHost for PanelRegistry {
    fn add_panel(&mut self, id: String, panel: Arc<StatePanel>) {
        // Re-registering replaces and unmounts the old panel.
        if let Some(old) = self.panels.insert(id, panel) {
            old.unmount();
        }
    }
}
