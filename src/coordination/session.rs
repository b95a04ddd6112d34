use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::CoordinationClient;
use super::SessionConnector;
use super::SessionEvent;
use crate::CoordinationConfig;
use crate::Result;

/// Tracks connectivity to the coordination service and owns the live
/// client handle.
///
/// The handle lives behind an [`ArcSwap`]: reconnection builds a whole new
/// client and swaps it in, so in-flight operations complete against the old
/// session while new operations resolve the fresh one via [`client()`].
///
/// [`client()`]: SessionManager::client
pub struct SessionManager {
    inner: ArcSwap<SessionInner>,
    connected: watch::Sender<bool>,
    connector: Arc<dyn SessionConnector>,
    config: CoordinationConfig,
    shutdown: CancellationToken,
}

pub(crate) struct SessionInner {
    pub(crate) client: Arc<dyn CoordinationClient>,
}

impl SessionManager {
    /// Open the initial session and start the lifecycle supervisor.
    ///
    /// The gate starts closed; it opens when the connector signals
    /// [`SessionEvent::Established`].
    pub async fn connect(
        connector: Arc<dyn SessionConnector>,
        config: CoordinationConfig,
        shutdown: CancellationToken,
    ) -> Result<Arc<Self>> {
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let client = connector.connect(&config, lifecycle_tx.clone()).await?;

        let (connected, _) = watch::channel(false);
        let manager = Arc::new(Self {
            inner: ArcSwap::from_pointee(SessionInner { client }),
            connected,
            connector,
            config,
            shutdown,
        });

        tokio::spawn(Arc::clone(&manager).supervise(lifecycle_rx, lifecycle_tx));

        Ok(manager)
    }

    /// Current live client handle.
    ///
    /// Callers that crossed the gate re-resolve the handle through this
    /// method rather than caching it, since reconnection replaces the
    /// instance.
    pub fn client(&self) -> Arc<dyn CoordinationClient> {
        Arc::clone(&self.inner.load().client)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Suspend until the session is connected; returns immediately when the
    /// gate is already open.
    pub async fn await_connected(&self) {
        let mut rx = self.connected.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Sender lives inside self; closure only happens on teardown.
                return;
            }
        }
    }

    /// Consumes lifecycle signals: `Established` opens the gate, `Lost`
    /// closes it and rebuilds the session.
    async fn supervise(
        self: Arc<Self>,
        mut lifecycle_rx: mpsc::UnboundedReceiver<SessionEvent>,
        lifecycle_tx: mpsc::UnboundedSender<SessionEvent>,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("session supervisor shutting down");
                    break;
                }
                event = lifecycle_rx.recv() => match event {
                    Some(SessionEvent::Established) => {
                        debug!("coordination session established");
                        // send_replace: the value must latch even when no
                        // receiver is subscribed yet, since callers usually
                        // enter the gate after establishment.
                        self.connected.send_replace(true);
                    }
                    Some(SessionEvent::Lost) => {
                        warn!("coordination session lost; rebuilding");
                        self.connected.send_replace(false);
                        self.rebuild(lifecycle_tx.clone()).await;
                    }
                    None => break,
                },
            }
        }
    }

    /// Best-effort session rebuild. Connect failures are left to the
    /// connector's own retry behavior; the gate simply stays closed.
    async fn rebuild(&self, lifecycle_tx: mpsc::UnboundedSender<SessionEvent>) {
        match self.connector.connect(&self.config, lifecycle_tx).await {
            Ok(client) => {
                self.inner.store(Arc::new(SessionInner { client }));
                debug!("new coordination session wired in");
            }
            Err(e) => {
                error!("session rebuild failed: {e}");
            }
        }
    }
}
