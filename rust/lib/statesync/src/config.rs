//! Integration settings, read from a TOML file.
//!
//! ```toml
//! namespace = "versafleet"
//! panel-title = "Story state"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;
use crate::panel::DEFAULT_PANEL_TITLE;
use crate::protocol::{ChannelTopics, DEFAULT_NAMESPACE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SyncConfig {
    /// Prefix for the change/reset topics.
    pub namespace: String,

    /// Title of the observer panel.
    pub panel_title: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            panel_title: DEFAULT_PANEL_TITLE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Load config from disk, or return the default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SyncError> {
        let config: SyncConfig = toml::from_str(content)?;
        // Reject a bad namespace at load time rather than at first mount.
        config.topics()?;
        Ok(config)
    }

    pub fn topics(&self) -> Result<ChannelTopics, SyncError> {
        ChannelTopics::new(&self.namespace)
    }
}
