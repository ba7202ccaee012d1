//! One producer and one observer panel sharing a channel.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::Value;
use statesync::panel::{self, PanelRegistry};
use statesync::{
    ChannelTopics, Factory, MemoryChannel, PanelProps, RenderResult, StateMap, StatePanel,
    StateView, StoreScope, StoryThunk, SyncConfig,
};
use tracing::debug;

/// Parse a JSON object.
pub fn parse_object(text: &str) -> anyhow::Result<StateMap> {
    let value: Value = serde_json::from_str(text).with_context(|| format!("invalid JSON: {text}"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("expected a JSON object, got {other}"),
    }
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Set(StateMap),
    Reset,
    Mount,
    Unmount,
    Focus,
    Blur,
    Show,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = match s.trim().split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (s.trim(), ""),
        };
        match verb {
            "set" => Ok(Command::Set(parse_object(rest)?)),
            "reset" => Ok(Command::Reset),
            "mount" => Ok(Command::Mount),
            "unmount" => Ok(Command::Unmount),
            "focus" => Ok(Command::Focus),
            "blur" => Ok(Command::Blur),
            "show" => Ok(Command::Show),
            other => bail!("unknown command: {other}"),
        }
    }
}

pub struct Session {
    thunk: StoryThunk<String>,
    view: Option<StateView<String>>,
    panel: Arc<StatePanel>,
    // Owns the registered panel.
    _host: PanelRegistry,
    active: bool,
}

impl Session {
    pub fn new(
        channel: Arc<MemoryChannel>,
        config: &SyncConfig,
        topics: ChannelTopics,
        initial: StateMap,
    ) -> Self {
        let mut host = PanelRegistry::new();
        let panel = panel::register(&mut host, channel.clone(), topics.clone(), &config.panel_title);

        // Shared scope: unmount + mount keeps the producer's state.
        let thunk = Factory::new(channel, topics)
            .with_state(initial, |args| {
                RenderResult::Element(format!("producer: {}", args.store().state().to_value()))
            })
            .in_scope(StoreScope::Shared("statepanel".into()));
        let view = thunk.call();

        Self {
            thunk,
            view: Some(view),
            panel,
            _host: host,
            active: true,
        }
    }

    pub fn execute(&mut self, line: &str) -> anyhow::Result<()> {
        let command: Command = line.parse()?;
        debug!(?command, "execute");
        match command {
            Command::Set(partial) => match &self.view {
                Some(view) => view.store().set(partial),
                None => bail!("producer is not mounted"),
            },
            Command::Reset => self.panel.press_reset(),
            Command::Mount => {
                if self.view.is_none() {
                    self.view = Some(self.thunk.call());
                }
            }
            Command::Unmount => {
                self.view = None;
            }
            Command::Focus => self.active = true,
            Command::Blur => self.active = false,
            Command::Show => {}
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let producer = match &self.view {
            Some(view) => view.render(),
            None => "producer: (unmounted)".to_string(),
        };
        let panel = match self.panel.render(PanelProps {
            active: self.active,
        }) {
            Some(view) => view.to_string(),
            None => "(nothing to show)\n".to_string(),
        };
        format!("{producer}\n[{}]\n{panel}", self.panel.title())
    }
}
