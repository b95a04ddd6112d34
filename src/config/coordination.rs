use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Connection parameters for the external coordination service
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoordinationConfig {
    /// Connection string for the coordination service ensemble
    /// Default value is set via default_connect_string() function
    #[serde(default = "default_connect_string")]
    pub connect_string: String,

    /// Session timeout negotiated with the coordination service (milliseconds)
    /// Watches and ephemeral state survive shorter outages than this
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Timeout for establishing a new session (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            connect_string: default_connect_string(),
            session_timeout_ms: default_session_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl CoordinationConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_string.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "connect_string must not be empty".into(),
            )));
        }

        if self.session_timeout_ms < 1 {
            return Err(Error::Config(ConfigError::Message(
                "session_timeout_ms must be at least 1ms".into(),
            )));
        }

        if self.connect_timeout_ms < 1 {
            return Err(Error::Config(ConfigError::Message(
                "connect_timeout_ms must be at least 1ms".into(),
            )));
        }

        Ok(())
    }
}

fn default_connect_string() -> String {
    "127.0.0.1:2181".to_string()
}
// in ms
fn default_session_timeout_ms() -> u64 {
    30_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
