//! Coordination-service capability consumed by the registry.
//!
//! The registry never talks to a concrete coordination service; it sees the
//! store through [`CoordinationClient`] (node CRUD plus one-shot watches) and
//! obtains live clients through [`SessionConnector`], which also wires the
//! session lifecycle callback pair into the [`SessionManager`].
//!
//! Watches follow the store's one-shot delivery model: a read that requests a
//! watch returns a [`WatchSignal`] that fires at most once. Continuous
//! observation is built on top by the `watch` module, which re-arms inside
//! the fire handler.

mod session;
pub use session::*;

#[cfg(test)]
mod session_test;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::CoordinationConfig;
use crate::CoordinationError;

/// What kind of change fired a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// The watched node's data changed
    DataChanged,
    /// The watched node's child list changed
    ChildrenChanged,
    /// The watched node was deleted
    Deleted,
}

/// Notification delivered when a one-shot watch fires
#[derive(Debug, Clone)]
pub struct WatchedEvent {
    pub path: String,
    pub kind: WatchKind,
}

/// One-shot watch registration.
///
/// Resolves at most once. A closed channel (sender dropped without firing)
/// means the session that armed the watch was replaced; holders re-arm
/// against the current session.
pub type WatchSignal = oneshot::Receiver<WatchedEvent>;

/// Reply to a data read, optionally carrying a freshly armed watch
#[derive(Debug)]
pub struct DataReply {
    pub data: Bytes,
    pub watch: Option<WatchSignal>,
}

/// Reply to a children listing, optionally carrying a freshly armed watch
#[derive(Debug)]
pub struct ChildrenReply {
    pub children: Vec<String>,
    pub watch: Option<WatchSignal>,
}

/// Node CRUD and watch primitives of the coordination store.
///
/// Implementations wrap a live session; the instance is replaced, never
/// mutated, when the session is rebuilt (see [`SessionManager`]).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    async fn exists(&self, path: &str) -> std::result::Result<bool, CoordinationError>;

    /// List immediate children of `path`, optionally arming a one-shot
    /// watch on the child list.
    async fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> std::result::Result<ChildrenReply, CoordinationError>;

    /// Read node data, optionally arming a one-shot watch on the node.
    async fn get_data(
        &self,
        path: &str,
        watch: bool,
    ) -> std::result::Result<DataReply, CoordinationError>;

    async fn create(
        &self,
        path: &str,
        data: Bytes,
        persistent: bool,
    ) -> std::result::Result<(), CoordinationError>;

    async fn set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> std::result::Result<(), CoordinationError>;

    async fn delete(&self, path: &str) -> std::result::Result<(), CoordinationError>;
}

/// Session lifecycle signals delivered by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session is established and calls may proceed
    Established,
    /// The session was lost; a new one must be built
    Lost,
}

/// Builds live coordination clients.
///
/// `connect` dials the ensemble named by `config` and wires the given
/// lifecycle sender into the new session so that `Established`/`Lost`
/// signals reach the [`SessionManager`]. Retry and backoff of the physical
/// connection are the connector's own concern.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        config: &CoordinationConfig,
        lifecycle: mpsc::UnboundedSender<SessionEvent>,
    ) -> std::result::Result<Arc<dyn CoordinationClient>, CoordinationError>;
}
