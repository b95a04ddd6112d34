//! Command registry mirror.
//!
//! Provides the application-facing surface of the crate:
//! - [`CommandRegistry`] - cached view of the remote command tree
//! - [`CommandRegistryBuilder`] - configurable construction
//! - [`CommandDescriptor`] / [`DescriptorCodec`] - the mirrored unit and its
//!   byte encoding
//! - [`CommandEvent`] - typed change notifications
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//! use command_registry::{CommandDescriptor, CommandRegistry, SessionConnector};
//!
//! # async fn example(connector: Arc<dyn SessionConnector>) -> command_registry::Result<()> {
//! let registry = CommandRegistry::builder()
//!     .connector(connector)
//!     .root_path("/services/commands")
//!     .build()
//!     .await?;
//!
//! // First access performs the initial load and arms the watches.
//! let commands = registry.list_commands().await?;
//! println!("mirrored commands: {}", commands.len());
//!
//! // React to remote changes.
//! let mut events = registry.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("command change: {:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

mod bulk;
mod cache;
mod descriptor;
mod event;
mod reconcile;

pub use descriptor::*;
pub use event::CommandEvent;


use std::sync::Arc;

use cache::CommandCache;
use config::ConfigError;
use event::EventBus;
use reconcile::ReconcileEngine;
use tokio::sync::broadcast;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::CoordinationConfig;
use crate::Error;
use crate::RegistryConfig;
use crate::RegistryError;
use crate::Result;
use crate::SessionConnector;
use crate::SessionManager;
use crate::Settings;

/// Client-side mirror of the remote command tree.
///
/// Keeps an eventually-fresh local cache of descriptors, replays
/// created/removed/changed events to subscribers, and survives session loss
/// by re-establishing its watches. Reads come from the in-process snapshot;
/// they never block on a remote roundtrip once the initial load completed.
pub struct CommandRegistry {
    session: Arc<SessionManager>,
    cache: Arc<CommandCache>,
    codec: Arc<dyn DescriptorCodec>,
    engine: Arc<ReconcileEngine>,
    events: EventBus,
    root_path: String,
    init: OnceCell<()>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("root_path", &self.root_path)
            .finish_non_exhaustive()
    }
}

impl CommandRegistry {
    /// Create a configured registry builder.
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::new()
    }

    /// Current descriptors, in no particular order.
    ///
    /// The first call performs the blocking initial load (children listing
    /// plus one fetch per child) and arms the watches; subsequent calls
    /// return the in-memory snapshot directly. "Nothing registered yet" is
    /// an empty collection, never an error.
    pub async fn list_commands(&self) -> Result<Vec<CommandDescriptor>> {
        self.ensure_loaded().await?;
        Ok(self.cache.commands())
    }

    /// Upsert descriptors into the remote tree; idempotent.
    ///
    /// A descriptor whose stored bytes already match is not rewritten, so
    /// repeated calls fire no spurious watches on other mirrors.
    pub async fn set_commands(&self, descriptors: &[CommandDescriptor]) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(RegistryError::ShuttingDown.into());
        }
        self.session.await_connected().await;
        let client = self.session.client();
        bulk::write_all(client.as_ref(), self.codec.as_ref(), &self.root_path, descriptors).await
    }

    /// Administrative wipe of the whole command tree.
    pub async fn clear(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(RegistryError::ShuttingDown.into());
        }
        self.session.await_connected().await;
        let client = self.session.client();
        bulk::clear_all(client.as_ref(), &self.root_path).await
    }

    /// Subscribe to change events.
    ///
    /// Events emitted before the subscription are not replayed; take a
    /// snapshot via [`list_commands`](CommandRegistry::list_commands) after
    /// subscribing to avoid a gap.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    /// Stop the watchers and the session supervisor.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(RegistryError::ShuttingDown.into());
        }
        self.init
            .get_or_try_init(|| self.engine.initial_load())
            .await?;
        Ok(())
    }
}

impl Drop for CommandRegistry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Builder for [`CommandRegistry`].
pub struct CommandRegistryBuilder {
    connector: Option<Arc<dyn SessionConnector>>,
    codec: Arc<dyn DescriptorCodec>,
    coordination: CoordinationConfig,
    root_path: String,
    event_channel_capacity: usize,
}

impl Default for CommandRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistryBuilder {
    pub fn new() -> Self {
        let defaults = RegistryConfig::default();
        Self {
            connector: None,
            codec: Arc::new(BincodeCodec),
            coordination: CoordinationConfig::default(),
            root_path: defaults.root_path,
            event_channel_capacity: defaults.event_channel_capacity,
        }
    }

    /// Session connector for the coordination service; required.
    pub fn connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Descriptor byte codec; defaults to [`BincodeCodec`].
    pub fn codec(mut self, codec: Arc<dyn DescriptorCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Connection parameters handed to the connector on every (re)connect.
    pub fn coordination_config(mut self, config: CoordinationConfig) -> Self {
        self.coordination = config;
        self
    }

    /// Root path of the command tree.
    pub fn root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Apply loaded [`Settings`]: connection parameters for the connector
    /// plus the registry section.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.coordination = settings.coordination.clone();
        self.root_path = settings.registry.root_path.clone();
        self.event_channel_capacity = settings.registry.event_channel_capacity;
        self
    }

    /// Open the session and assemble the registry.
    ///
    /// No command data is read here; the initial load is lazy and happens
    /// on first access.
    pub async fn build(self) -> Result<CommandRegistry> {
        let connector = self.connector.ok_or_else(|| {
            Error::Config(ConfigError::Message("a session connector is required".into()))
        })?;

        let config = RegistryConfig {
            root_path: self.root_path.clone(),
            event_channel_capacity: self.event_channel_capacity,
        };
        config.validate()?;
        self.coordination.validate()?;

        let shutdown = CancellationToken::new();
        let session =
            SessionManager::connect(connector, self.coordination, shutdown.child_token()).await?;

        let cache = Arc::new(CommandCache::new());
        let events = EventBus::new(self.event_channel_capacity);
        let engine = ReconcileEngine::new(
            Arc::clone(&session),
            Arc::clone(&cache),
            Arc::clone(&self.codec),
            events.clone(),
            self.root_path.clone(),
            shutdown.child_token(),
        );

        Ok(CommandRegistry {
            session,
            cache,
            codec: self.codec,
            engine,
            events,
            root_path: self.root_path,
            init: OnceCell::new(),
            shutdown,
        })
    }
}
