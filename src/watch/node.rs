use std::mem;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::Result;
use crate::SessionManager;
use crate::WatchSignal;

/// Pause between re-arm attempts when the connection drops mid-read but the
/// gate has not closed yet.
pub(crate) const REARM_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Callback invoked when a watched node's data actually changed.
#[async_trait]
pub trait NodeChangeHandler: Send + Sync {
    /// Called with the previous and the new raw bytes. Errors are surfaced
    /// through the watcher's log channel; the watch loop itself continues.
    async fn on_node_changed(&self, path: &str, old: Bytes, new: Bytes) -> Result<()>;

    /// Called once when the watcher stops re-arming (node gone or shutdown).
    async fn on_node_retired(&self, _path: &str) {}
}

/// Watches a single node's data.
///
/// On fire: re-read with a fresh watch, compare old vs. new bytes, invoke
/// the handler only on a real difference. Identical bytes (no-op writes,
/// duplicate deliveries) re-arm silently. A missing node retires the
/// watcher.
pub struct NodeWatcher {
    session: Arc<SessionManager>,
    path: String,
    last: Bytes,
    handler: Arc<dyn NodeChangeHandler>,
    shutdown: CancellationToken,
}

impl NodeWatcher {
    /// Spawn the watch loop for `path`, seeded with the bytes and watch
    /// signal of the initial read.
    pub fn spawn(
        session: Arc<SessionManager>,
        path: String,
        initial: Bytes,
        signal: WatchSignal,
        handler: Arc<dyn NodeChangeHandler>,
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
                        trace!(path = %self.path, kind = ?event.kind, "node watch fired");
                    }
                    Err(_) => {
                        // Session replaced; re-read against the new one.
                        debug!(path = %self.path, "node watch channel closed; re-arming");
                    }
                },
            }

            match self.rearm().await {
                Some(next) => signal = next,
                None => break,
            }
        }

        self.handler.on_node_retired(&self.path).await;
    }

    /// Re-read the node with a fresh watch, dispatching a change when the
    /// bytes differ. Returns the next signal, or `None` when the watcher
    /// retires.
    async fn rearm(&mut self) -> Option<WatchSignal> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = self.session.await_connected() => {}
            }

            let client = self.session.client();
            match client.get_data(&self.path, true).await {
                Ok(reply) => {
                    if reply.data != self.last {
                        let old = mem::replace(&mut self.last, reply.data.clone());
                        if let Err(e) = self.handler.on_node_changed(&self.path, old, reply.data).await {
                            error!(path = %self.path, "node change handler failed: {e}");
                        }
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
                    debug!(path = %self.path, "node gone; watcher retired");
                    return None;
                }
                Err(e) if e.is_retriable() => {
                    debug!(path = %self.path, "transient failure during re-arm: {e}; retrying");
                    tokio::time::sleep(REARM_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!(path = %self.path, "node re-arm failed: {e}; watcher retired");
                    return None;
                }
            }
        }
    }
}
