use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Command-tree layout and event delivery parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Root path of the command tree; immediate children are service ids
    /// Default value is set via default_root_path() function
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Capacity of the change-event broadcast channel
    /// Slow subscribers that fall further behind than this lose events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.root_path.starts_with('/') {
            return Err(Error::Config(ConfigError::Message(
                "root_path must be absolute (start with '/')".into(),
            )));
        }

        if self.root_path.len() > 1 && self.root_path.ends_with('/') {
            return Err(Error::Config(ConfigError::Message(
                "root_path must not end with '/'".into(),
            )));
        }

        if self.event_channel_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "event_channel_capacity must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_root_path() -> String {
    "/services/commands".to_string()
}
fn default_event_channel_capacity() -> usize {
    1024
}
