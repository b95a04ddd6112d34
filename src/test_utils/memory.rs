//! In-memory coordination store with real one-shot watch semantics.
//!
//! `MemoryCoordination` backs the watcher and reconciliation tests: it keeps
//! a node tree in memory, fires armed one-shot watches on mutation, and
//! counts calls so tests can assert lazy-load behavior. `MemoryConnector`
//! drives the session lifecycle, including scripted session loss.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::utils;
use crate::ChildrenReply;
use crate::CoordinationClient;
use crate::CoordinationConfig;
use crate::CoordinationError;
use crate::DataReply;
use crate::SessionConnector;
use crate::SessionEvent;
use crate::WatchKind;
use crate::WatchedEvent;

#[derive(Debug, Default)]
pub struct CallCounters {
    pub exists: AtomicUsize,
    pub get_children: AtomicUsize,
    pub get_data: AtomicUsize,
    pub create: AtomicUsize,
    pub set_data: AtomicUsize,
    pub delete: AtomicUsize,
}

impl CallCounters {
    pub fn remote_reads(&self) -> usize {
        self.get_children.load(Ordering::Relaxed) + self.get_data.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct TreeState {
    nodes: BTreeMap<String, Bytes>,
    data_watches: HashMap<String, Vec<oneshot::Sender<WatchedEvent>>>,
    children_watches: HashMap<String, Vec<oneshot::Sender<WatchedEvent>>>,
}

impl TreeState {
    fn child_names(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        self.nodes
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    fn fire_data(&mut self, path: &str, kind: WatchKind) {
        if let Some(watchers) = self.data_watches.remove(path) {
            for watcher in watchers {
                let _ = watcher.send(WatchedEvent {
                    path: path.to_string(),
                    kind,
                });
            }
        }
    }

    fn fire_children(&mut self, path: &str, kind: WatchKind) {
        if let Some(watchers) = self.children_watches.remove(path) {
            for watcher in watchers {
                let _ = watcher.send(WatchedEvent {
                    path: path.to_string(),
                    kind,
                });
            }
        }
    }
}

pub struct MemoryCoordination {
    state: Mutex<TreeState>,
    pub calls: CallCounters,
}

impl Default for MemoryCoordination {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TreeState::default()),
            calls: CallCounters::default(),
        }
    }

    /// Insert a node and its ancestors without firing watches or touching
    /// the call counters; test fixture setup only.
    pub fn seed(&self, path: &str, data: Bytes) {
        let mut state = self.state.lock();
        for ancestor in utils::ancestors(path) {
            state.nodes.entry(ancestor).or_insert_with(Bytes::new);
        }
        state.nodes.insert(path.to_string(), data);
    }

    pub fn node_data(&self, path: &str) -> Option<Bytes> {
        self.state.lock().nodes.get(path).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    /// Drop every armed watch without firing it, the way a replaced session
    /// abandons its registrations.
    pub fn drop_watches(&self) {
        let mut state = self.state.lock();
        state.data_watches.clear();
        state.children_watches.clear();
    }

    fn parent_exists(state: &TreeState, path: &str) -> bool {
        match utils::parent(path) {
            Some("/") | None => true,
            Some(parent) => state.nodes.contains_key(parent),
        }
    }
}

#[async_trait]
impl CoordinationClient for MemoryCoordination {
    async fn exists(&self, path: &str) -> std::result::Result<bool, CoordinationError> {
        self.calls.exists.fetch_add(1, Ordering::Relaxed);
        Ok(path == "/" || self.state.lock().nodes.contains_key(path))
    }

    async fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> std::result::Result<ChildrenReply, CoordinationError> {
        self.calls.get_children.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if path != "/" && !state.nodes.contains_key(path) {
            return Err(CoordinationError::NodeMissing { path: path.to_string() });
        }
        let children = state.child_names(path);
        let signal = if watch {
            let (tx, rx) = oneshot::channel();
            state.children_watches.entry(path.to_string()).or_default().push(tx);
            Some(rx)
        } else {
            None
        };
        Ok(ChildrenReply { children, watch: signal })
    }

    async fn get_data(
        &self,
        path: &str,
        watch: bool,
    ) -> std::result::Result<DataReply, CoordinationError> {
        self.calls.get_data.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        let data = state
            .nodes
            .get(path)
            .cloned()
            .ok_or_else(|| CoordinationError::NodeMissing { path: path.to_string() })?;
        let signal = if watch {
            let (tx, rx) = oneshot::channel();
            state.data_watches.entry(path.to_string()).or_default().push(tx);
            Some(rx)
        } else {
            None
        };
        Ok(DataReply { data, watch: signal })
    }

    async fn create(
        &self,
        path: &str,
        data: Bytes,
        _persistent: bool,
    ) -> std::result::Result<(), CoordinationError> {
        self.calls.create.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.nodes.contains_key(path) {
            return Err(CoordinationError::NodeExists { path: path.to_string() });
        }
        if !Self::parent_exists(&state, path) {
            return Err(CoordinationError::NodeMissing {
                path: utils::parent(path).unwrap_or("/").to_string(),
            });
        }
        state.nodes.insert(path.to_string(), data);
        if let Some(parent) = utils::parent(path) {
            state.fire_children(parent, WatchKind::ChildrenChanged);
        }
        Ok(())
    }

    async fn set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> std::result::Result<(), CoordinationError> {
        self.calls.set_data.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if !state.nodes.contains_key(path) {
            return Err(CoordinationError::NodeMissing { path: path.to_string() });
        }
        state.nodes.insert(path.to_string(), data);
        state.fire_data(path, WatchKind::DataChanged);
        Ok(())
    }

    async fn delete(&self, path: &str) -> std::result::Result<(), CoordinationError> {
        self.calls.delete.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if !state.nodes.contains_key(path) {
            return Err(CoordinationError::NodeMissing { path: path.to_string() });
        }
        if !state.child_names(path).is_empty() {
            return Err(CoordinationError::NotEmpty { path: path.to_string() });
        }
        state.nodes.remove(path);
        state.fire_data(path, WatchKind::Deleted);
        state.fire_children(path, WatchKind::Deleted);
        if let Some(parent) = utils::parent(path) {
            state.fire_children(parent, WatchKind::ChildrenChanged);
        }
        Ok(())
    }
}

/// Scriptable session connector over a shared [`MemoryCoordination`].
///
/// The same client instance backs every "session"; session replacement is
/// emulated by dropping the armed watches, which is what watchers observe
/// when a real client is swapped out.
pub struct MemoryConnector {
    client: Arc<MemoryCoordination>,
    lifecycle: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    auto_establish: AtomicBool,
    pub connect_calls: AtomicUsize,
    /// Connect string of the most recent `connect` call.
    pub last_connect_string: Mutex<Option<String>>,
}

impl MemoryConnector {
    pub fn new(client: Arc<MemoryCoordination>) -> Self {
        Self {
            client,
            lifecycle: Mutex::new(None),
            auto_establish: AtomicBool::new(true),
            connect_calls: AtomicUsize::new(0),
            last_connect_string: Mutex::new(None),
        }
    }

    /// When disabled, `connect` does not signal `Established`; the test
    /// drives the gate through [`establish`](MemoryConnector::establish).
    pub fn set_auto_establish(&self, on: bool) {
        self.auto_establish.store(on, Ordering::Relaxed);
    }

    pub fn establish(&self) {
        if let Some(tx) = &*self.lifecycle.lock() {
            let _ = tx.send(SessionEvent::Established);
        }
    }

    /// Simulate session loss: abandon armed watches and signal `Lost`.
    pub fn lose_session(&self) {
        self.client.drop_watches();
        if let Some(tx) = &*self.lifecycle.lock() {
            let _ = tx.send(SessionEvent::Lost);
        }
    }
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    async fn connect(
        &self,
        config: &CoordinationConfig,
        lifecycle: mpsc::UnboundedSender<SessionEvent>,
    ) -> std::result::Result<Arc<dyn CoordinationClient>, CoordinationError> {
        self.connect_calls.fetch_add(1, Ordering::Relaxed);
        *self.last_connect_string.lock() = Some(config.connect_string.clone());
        if self.auto_establish.load(Ordering::Relaxed) {
            let _ = lifecycle.send(SessionEvent::Established);
        }
        *self.lifecycle.lock() = Some(lifecycle);
        Ok(Arc::clone(&self.client) as Arc<dyn CoordinationClient>)
    }
}
