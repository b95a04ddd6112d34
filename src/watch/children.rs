use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::node::REARM_RETRY_DELAY;
use crate::Result;
use crate::SessionManager;
use crate::WatchSignal;

/// Callback invoked when a watched node's child list changed.
///
/// Receives the full old and new child-name collections; computing the
/// created/removed difference is the reconciliation engine's job.
#[async_trait]
pub trait ChildrenChangeHandler: Send + Sync {
    async fn on_children_changed(
        &self,
        path: &str,
        old: Vec<String>,
        new: Vec<String>,
    ) -> Result<()>;
}

/// Watches one node's child list.
///
/// On fire: re-list with a fresh watch and hand the old/new collections to
/// the handler. A missing parent is reported once as an empty child set and
/// the watcher retires without re-arming.
pub struct ChildrenWatcher {
    session: Arc<SessionManager>,
    path: String,
    last: Vec<String>,
    handler: Arc<dyn ChildrenChangeHandler>,
    shutdown: CancellationToken,
}

impl ChildrenWatcher {
    /// Spawn the watch loop for `path`, seeded with the child list and watch
    /// signal of the initial listing.
    pub fn spawn(
        session: Arc<SessionManager>,
        path: String,
        initial: Vec<String>,
        signal: WatchSignal,
        handler: Arc<dyn ChildrenChangeHandler>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let watcher = Self {
            session,
            path,
            last: initial,
            handler,
            shutdown,
        };
        tokio::spawn(watcher.run(signal))
    }

    async fn run(mut self, mut signal: WatchSignal) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                fired = &mut signal => match fired {
                    Ok(event) => {
                        trace!(path = %self.path, kind = ?event.kind, "children watch fired");
                    }
                    Err(_) => {
                        debug!(path = %self.path, "children watch channel closed; re-arming");
                    }
                },
            }

            match self.rearm().await {
                Some(next) => signal = next,
                None => break,
            }
        }
    }

    async fn rearm(&mut self) -> Option<WatchSignal> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = self.session.await_connected() => {}
            }

            let client = self.session.client();
            match client.get_children(&self.path, true).await {
                Ok(reply) => {
                    let old = mem::replace(&mut self.last, reply.children.clone());
                    if let Err(e) = self
                        .handler
                        .on_children_changed(&self.path, old, reply.children)
                        .await
                    {
                        error!(path = %self.path, "children change handler failed: {e}");
                    }
                    match reply.watch {
                        Some(next) => return Some(next),
                        None => {
                            warn!(path = %self.path, "store granted no watch; watcher retired");
                            return None;
                        }
                    }
                }
                Err(e) if e.is_node_missing() => {
                    // Parent gone: the child set is now empty by definition.
                    debug!(path = %self.path, "parent gone; reporting empty child set and retiring");
                    let old = mem::take(&mut self.last);
                    if !old.is_empty() {
                        if let Err(e) = self.handler.on_children_changed(&self.path, old, Vec::new()).await {
                            error!(path = %self.path, "children change handler failed: {e}");
                        }
                    }
                    return None;
                }
                Err(e) if e.is_retriable() => {
                    debug!(path = %self.path, "transient failure during re-arm: {e}; retrying");
                    tokio::time::sleep(REARM_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!(path = %self.path, "children re-arm failed: {e}; watcher retired");
                    return None;
                }
            }
        }
    }
}
