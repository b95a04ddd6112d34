//! Configuration management for the command registry mirror.
//!
//! Provides configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Main config file
//! 3. Caller-supplied config file
//! 4. Environment variables (highest priority)

mod coordination;
mod registry;
pub use coordination::*;
pub use registry::*;


//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Coordination-service connection parameters
    #[serde(default)]
    pub coordination: CoordinationConfig,
    /// Command-tree layout and event delivery parameters
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Base config file (`config/registry`, optional)
    /// 2. Caller-supplied config file
    /// 3. Environment variables
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a node-specific configuration file
    ///
    /// # Returns
    /// Merged, validated configuration with proper priority ordering
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::with_name("config/registry").required(false));

        if let Some(custom) = config_path {
            builder = builder.add_source(File::with_name(custom).required(true));
        }

        // Environment variables (highest priority)
        builder = builder.add_source(
            Environment::with_prefix("REGISTRY")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates all subsystem configurations
    pub fn validate(&self) -> Result<()> {
        self.coordination.validate()?;
        self.registry.validate()?;
        Ok(())
    }
}
