//! Command Registry Error Hierarchy
//!
//! Defines error types for the registry mirror, categorized by the layer
//! that produced them: coordination-store calls, descriptor encoding,
//! configuration, and registry-internal invariants.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Coordination-store call failures (missing nodes, lost connections)
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// Descriptor encode/decode failures
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry-internal invariant violations
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors surfaced by the coordination-store client.
///
/// `NodeMissing` and `NotEmpty` are classifiable conditions rather than
/// hard failures: a missing node is a valid "nothing registered" state on
/// the read path, and callers match on them to decide skip/stop behavior.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    /// The target node does not exist
    #[error("node does not exist: {path}")]
    NodeMissing { path: String },

    /// Creation attempted on an existing node
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// Deletion attempted on a node that still has children
    #[error("node has children: {path}")]
    NotEmpty { path: String },

    /// The connection to the coordination service dropped mid-call
    #[error("connection to the coordination service was lost")]
    ConnectionLoss,

    /// The session expired and must be rebuilt
    #[error("coordination session expired")]
    SessionExpired,

    /// A single call exceeded the client's own deadline
    #[error("coordination call timed out after {0:?}")]
    Timeout(Duration),

    /// Any other client-level failure
    #[error("coordination client error: {0}")]
    Client(String),
}

impl CoordinationError {
    /// True for the soft "target is gone" condition that read paths treat
    /// as a valid empty/skip state.
    pub fn is_node_missing(&self) -> bool {
        matches!(self, CoordinationError::NodeMissing { .. })
    }

    /// True for transient connectivity conditions that resolve once the
    /// session gate reopens.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CoordinationError::ConnectionLoss
                | CoordinationError::SessionExpired
                | CoordinationError::Timeout(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("descriptor encode failed: {0}")]
    Encode(#[source] bincode::Error),

    #[error("descriptor decode failed: {0}")]
    Decode(#[source] bincode::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A node-change fired for a service id the cache does not track.
    /// The node was supposedly already mirrored, so this is a local
    /// invariant breach; the triggering mutation is aborted.
    #[error("node change received for untracked service id: {service_id}")]
    UntrackedCommand { service_id: String },

    /// Operations rejected after the registry began shutting down
    #[error("registry is shutting down")]
    ShuttingDown,
}
