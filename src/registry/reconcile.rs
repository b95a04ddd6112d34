use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::cache::CommandCache;
use super::event::EventBus;
use super::CommandDescriptor;
use super::CommandEvent;
use super::DescriptorCodec;
use super::ServiceId;
use crate::utils;
use crate::ChildrenChangeHandler;
use crate::ChildrenWatcher;
use crate::NodeChangeHandler;
use crate::NodeWatcher;
use crate::Result;
use crate::SessionManager;
use crate::WatchSignal;

/// Turns remote-state comparisons into cache mutations and events.
///
/// Owns the initial load, the children-diff handling and the single-node
/// change handling. All cache mutations funnel through [`CommandCache`]'s
/// mutation lock; events are published only after the mutation is visible.
pub(crate) struct ReconcileEngine {
    session: Arc<SessionManager>,
    cache: Arc<CommandCache>,
    codec: Arc<dyn DescriptorCodec>,
    events: EventBus,
    root_path: String,
    /// Node paths with a live data watcher; prevents double-arming a child
    /// whose watcher survived a children-diff replay.
    armed: DashMap<String, ()>,
    shutdown: CancellationToken,
    this: Weak<ReconcileEngine>,
}

/// A fetched child whose watch signal has not been handed to a watcher yet.
///
/// Watchers are spawned only after the cache mutation that tracks the
/// descriptor is visible; a signal that fired in between stays buffered and
/// replays as an ordinary diff against the populated cache.
struct FetchedChild {
    descriptor: CommandDescriptor,
    path: String,
    data: Bytes,
    watch: Option<WatchSignal>,
}

impl ReconcileEngine {
    pub(crate) fn new(
        session: Arc<SessionManager>,
        cache: Arc<CommandCache>,
        codec: Arc<dyn DescriptorCodec>,
        events: EventBus,
        root_path: String,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            session,
            cache,
            codec,
            events,
            root_path,
            armed: DashMap::new(),
            shutdown,
            this: this.clone(),
        })
    }

    /// Discover remote state and populate the cache.
    ///
    /// Lists the root with a watch, fetches every child, publishes the full
    /// snapshot, and only then starts the watchers. A missing root is a
    /// valid "nothing registered yet" state, not a failure. A child that
    /// vanishes between listing and fetch is skipped.
    pub(crate) async fn initial_load(&self) -> Result<()> {
        self.session.await_connected().await;
        let client = self.session.client();

        if !client.exists(&self.root_path).await? {
            warn!(root = %self.root_path, "command root does not exist; starting empty");
            self.cache.replace_all(Vec::new());
            return Ok(());
        }

        let reply = match client.get_children(&self.root_path, true).await {
            Ok(reply) => reply,
            Err(e) if e.is_node_missing() => {
                warn!(root = %self.root_path, "command root vanished during initial load; starting empty");
                self.cache.replace_all(Vec::new());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut fetched = Vec::with_capacity(reply.children.len());
        for name in &reply.children {
            if let Some(child) = self.fetch_child(name).await {
                fetched.push(child);
            }
        }

        let loaded: Vec<CommandDescriptor> = fetched.iter().map(|child| child.descriptor.clone()).collect();
        info!(root = %self.root_path, commands = loaded.len(), "initial command snapshot loaded");
        self.cache.replace_all(loaded);

        // Watchers start strictly after the snapshot is visible. A change
        // that landed during the fetch window is buffered in its one-shot
        // signal and is replayed as a diff, never overwritten.
        if let (Some(signal), Some(this)) = (reply.watch, self.this.upgrade()) {
            let _ = ChildrenWatcher::spawn(
                Arc::clone(&self.session),
                self.root_path.clone(),
                reply.children.clone(),
                signal,
                this,
                self.shutdown.child_token(),
            );
        }
        for child in fetched {
            self.arm_node_watcher(child);
        }
        Ok(())
    }

    /// Fetch one child's descriptor, leaving its watch signal unarmed.
    ///
    /// Soft-fails: a missing node, an undecodable payload or a descriptor
    /// whose id disagrees with its node name is logged and skipped so one
    /// bad child cannot block the whole registry.
    async fn fetch_child(&self, name: &str) -> Option<FetchedChild> {
        let path = utils::join(&self.root_path, name);
        let client = self.session.client();

        let reply = match client.get_data(&path, true).await {
            Ok(reply) => reply,
            Err(e) if e.is_node_missing() => {
                debug!(%path, "child vanished between listing and fetch; skipped");
                return None;
            }
            Err(e) => {
                warn!(%path, "descriptor fetch failed: {e}; skipped");
                return None;
            }
        };

        let descriptor = match self.codec.decode(&reply.data) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(%path, "descriptor decode failed: {e}; skipped");
                return None;
            }
        };
        if descriptor.service_id != name {
            warn!(%path, service_id = %descriptor.service_id, "descriptor id does not match its node name; skipped");
            return None;
        }

        Some(FetchedChild {
            descriptor,
            path,
            data: reply.data,
            watch: reply.watch,
        })
    }

    /// Hand a fetched child's signal to a node watcher.
    fn arm_node_watcher(&self, child: FetchedChild) {
        let signal = match child.watch {
            Some(signal) => signal,
            None => return,
        };
        // Arm only when no live watcher holds this path; otherwise the
        // surviving watcher keeps observing and the extra signal is
        // dropped.
        if self.armed.insert(child.path.clone(), ()).is_none() {
            if let Some(this) = self.this.upgrade() {
                let _ = NodeWatcher::spawn(
                    Arc::clone(&self.session),
                    child.path,
                    child.data,
                    signal,
                    this,
                    self.shutdown.child_token(),
                );
            }
        }
    }
}

#[async_trait]
impl NodeChangeHandler for ReconcileEngine {
    /// A tracked node's bytes changed: decode, atomically replace by id,
    /// emit exactly one `Changed` carrying the new and old descriptor.
    ///
    /// The node name is the authoritative service id; a payload claiming a
    /// different id would corrupt another entry, so it is ignored.
    async fn on_node_changed(&self, path: &str, _old: Bytes, new: Bytes) -> Result<()> {
        let descriptor = self.codec.decode(&new)?;
        if descriptor.service_id != utils::child_name(path) {
            warn!(%path, service_id = %descriptor.service_id, "descriptor id does not match its node name; change ignored");
            return Ok(());
        }
        let old_descriptor = self.cache.replace_one(descriptor.clone())?;

        debug!(%path, service_id = %descriptor.service_id, "command descriptor updated");
        self.events.publish(CommandEvent::Changed {
            new: descriptor,
            old: old_descriptor,
        });
        Ok(())
    }

    async fn on_node_retired(&self, path: &str) {
        self.armed.remove(path);
    }
}

#[async_trait]
impl ChildrenChangeHandler for ReconcileEngine {
    /// The root's child set changed: fetch created children, apply the diff
    /// atomically, then emit one `Removed` batch and one `Created` batch.
    async fn on_children_changed(
        &self,
        path: &str,
        old: Vec<String>,
        new: Vec<String>,
    ) -> Result<()> {
        let old_set: HashSet<&String> = old.iter().collect();
        let new_set: HashSet<&String> = new.iter().collect();

        let deleted: HashSet<ServiceId> = old_set
            .difference(&new_set)
            .map(|name| (*name).clone())
            .collect();
        let created: Vec<&String> = new_set.difference(&old_set).cloned().collect();

        if deleted.is_empty() && created.is_empty() {
            return Ok(());
        }
        debug!(%path, created = created.len(), deleted = deleted.len(), "children diff computed");

        let mut fetched = Vec::with_capacity(created.len());
        for name in created {
            if let Some(child) = self.fetch_child(name).await {
                fetched.push(child);
            }
        }
        let added: Vec<CommandDescriptor> = fetched.iter().map(|child| child.descriptor.clone()).collect();

        let removed = self.cache.apply_diff(&deleted, added.clone());
        for child in fetched {
            self.arm_node_watcher(child);
        }

        for descriptor in removed {
            self.events.publish(CommandEvent::Removed(descriptor));
        }
        for descriptor in added {
            self.events.publish(CommandEvent::Created(descriptor));
        }
        Ok(())
    }
}
