//! The graph of graphs.
//!
//! [`GraphManager`] owns every [`NodeGraph`] the editor has seen, keyed by
//! graph index, and the `ConnectedThrough` edges linking a parent graph to
//! the nested graphs its nodes own. It fetches graphs on demand and routes
//! inbound engine messages to the right graph.
//!
//! ## Fetch de-duplication
//!
//! At most one `graph/get` is in flight per graph index. Callers that ask
//! for a graph while its fetch is pending subscribe to the same
//! [`watch`] channel and are all released by the snapshot that answers it,
//! or by the fetch timing out.
//!
//! The manager never awaits a graph's lock while holding its own state, so
//! callers may hold a graph's lock while calling into the manager.
//!
//! ## Nested graphs
//!
//! A nested graph whose last `ConnectedThrough` edge disappears is dropped,
//! unless a fetch for it is still pending.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use patchwire_core::{
    ConnectedThrough, CoreError, EdgeIndex, Graph, GraphIndex, NodeIndex, SocketRegistry,
};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::node_graph::{NodeGraph, SharedNodeGraph};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::Transport;

/// Progress of one pending fetch, as seen by its waiters.
#[derive(Debug, Clone, PartialEq)]
enum FetchStatus {
    Waiting,
    Loaded,
    Failed(String),
    TimedOut,
}

struct PendingFetch {
    id: u64,
    status: watch::Sender<FetchStatus>,
}

struct ManagerState {
    graphs: Graph<SharedNodeGraph, ConnectedThrough>,
    pending: HashMap<GraphIndex, PendingFetch>,
    /// Graphs that have applied at least one snapshot.
    loaded: HashSet<GraphIndex>,
    next_fetch_id: u64,
}

/// Keeps every known graph and synchronizes them with the engine.
pub struct GraphManager {
    state: Mutex<ManagerState>,
    transport: Arc<dyn Transport>,
    registry: Arc<RwLock<SocketRegistry>>,
    config: SyncConfig,
}

impl GraphManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<RwLock<SocketRegistry>>,
        config: SyncConfig,
    ) -> Self {
        GraphManager {
            state: Mutex::new(ManagerState {
                graphs: Graph::new(),
                pending: HashMap::new(),
                loaded: HashSet::new(),
                next_fetch_id: 0,
            }),
            transport,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RwLock<SocketRegistry>> {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    /// Returns the graph at `graph_index`, fetching it from the engine if no
    /// snapshot has arrived for it yet.
    pub async fn get_graph(&self, graph_index: GraphIndex) -> Result<SharedNodeGraph, SyncError> {
        let (graph, fetch_id, mut status) = {
            let mut state = self.state.lock().await;
            let graph = self.graph_or_placeholder(&mut state, graph_index)?;
            if state.loaded.contains(&graph_index) {
                return Ok(graph);
            }

            match state.pending.get(&graph_index) {
                Some(pending) => {
                    debug!(graph = %graph_index, "joining in-flight fetch");
                    (graph, pending.id, pending.status.subscribe())
                }
                None => {
                    self.transport.send(ClientMessage::GetGraph { graph_index })?;
                    let id = state.next_fetch_id;
                    state.next_fetch_id += 1;
                    let (sender, receiver) = watch::channel(FetchStatus::Waiting);
                    state.pending.insert(graph_index, PendingFetch { id, status: sender });
                    info!(graph = %graph_index, "requested graph");
                    (graph, id, receiver)
                }
            }
        };

        let outcome = match self.config.fetch_timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, wait_for_fetch(&mut status)).await;
                match waited {
                    Ok(outcome) => outcome,
                    Err(_) => self.expire_fetch(graph_index, fetch_id, &status).await,
                }
            }
            None => wait_for_fetch(&mut status).await,
        };

        match outcome {
            FetchStatus::Loaded => Ok(graph),
            FetchStatus::Failed(reason) => Err(SyncError::FetchFailed {
                graph: graph_index,
                reason,
            }),
            FetchStatus::TimedOut => Err(SyncError::FetchTimedOut {
                graph: graph_index,
                after: self.config.fetch_timeout.unwrap_or_default(),
            }),
            FetchStatus::Waiting => Err(SyncError::FetchFailed {
                graph: graph_index,
                reason: "fetch abandoned".to_string(),
            }),
        }
    }

    /// The top-level graph, `{0, 0}`.
    pub async fn get_root_graph(&self) -> Result<SharedNodeGraph, SyncError> {
        self.get_graph(GraphIndex::ROOT).await
    }

    /// The graph at `graph_index` if it is known, loaded or not. Never
    /// fetches.
    pub async fn cached_graph(&self, graph_index: GraphIndex) -> Option<SharedNodeGraph> {
        let state = self.state.lock().await;
        state.graphs.get_vertex_data(graph_index).cloned()
    }

    /// Every graph index the manager knows about, in slot order.
    pub async fn graph_indices(&self) -> Vec<GraphIndex> {
        let state = self.state.lock().await;
        state.graphs.iter_vertices().map(|(index, _)| index).collect()
    }

    /// Number of fetches currently awaiting a snapshot.
    pub async fn pending_fetches(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Drops the pending fetch `id` and wakes its waiters with a timeout.
    ///
    /// Returns the verdict the caller should report. A snapshot that landed
    /// while the timer fired wins over the timeout.
    async fn expire_fetch(
        &self,
        graph_index: GraphIndex,
        id: u64,
        status: &watch::Receiver<FetchStatus>,
    ) -> FetchStatus {
        let mut state = self.state.lock().await;
        if state.loaded.contains(&graph_index) {
            return FetchStatus::Loaded;
        }
        let settled = status.borrow().clone();
        if settled != FetchStatus::Waiting {
            return settled;
        }

        // Another waiter may already have expired it and a newer fetch may
        // have taken its place.
        if state.pending.get(&graph_index).is_some_and(|p| p.id == id) {
            if let Some(pending) = state.pending.remove(&graph_index) {
                pending.status.send_replace(FetchStatus::TimedOut);
                warn!(graph = %graph_index, "graph fetch timed out");
            }
        }
        FetchStatus::TimedOut
    }

    fn placeholder(&self, graph_index: GraphIndex) -> SharedNodeGraph {
        Arc::new(Mutex::new(NodeGraph::new(
            graph_index,
            Arc::clone(&self.transport),
            self.config.layout,
        )))
    }

    /// The graph stored at `graph_index`, inserting an empty one first if
    /// the slot holds nothing or an older generation.
    fn graph_or_placeholder(
        &self,
        state: &mut ManagerState,
        graph_index: GraphIndex,
    ) -> Result<SharedNodeGraph, SyncError> {
        if let Some(graph) = state.graphs.get_vertex_data(graph_index) {
            return Ok(Arc::clone(graph));
        }
        let graph = self.placeholder(graph_index);
        state.graphs.insert_vertex_at(graph_index, Arc::clone(&graph))?;
        // Drop the loaded mark of any older generation this evicted.
        let ManagerState { graphs, loaded, .. } = state;
        loaded.retain(|&index| graphs.contains_vertex(index));
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Dispatches one message from the engine.
    pub async fn handle_message(&self, message: serde_json::Value) -> Result<(), SyncError> {
        let message: ServerMessage =
            serde_json::from_value(message).map_err(SyncError::MalformedMessage)?;
        match message {
            ServerMessage::UpdateGraph { graph_index, nodes } => {
                self.apply_snapshot(graph_index, nodes).await
            }
            ServerMessage::UpdateRegistry(payload) => {
                let registry =
                    SocketRegistry::from_json(payload).map_err(SyncError::MalformedMessage)?;
                let count = registry.len();
                self.registry.write().await.replace(registry);
                debug!(sockets = count, "replaced socket registry");
                Ok(())
            }
        }
    }

    async fn apply_snapshot(&self, graph_index: GraphIndex, nodes: serde_json::Value) -> Result<(), SyncError> {
        let graph = {
            let mut state = self.state.lock().await;
            match self.graph_or_placeholder(&mut state, graph_index) {
                Ok(graph) => graph,
                Err(SyncError::Core(err @ CoreError::HandleOutOfRange { .. })) => {
                    warn!(graph = %graph_index, error = %err, "dropping snapshot for out-of-range graph");
                    return Err(SyncError::MalformedSnapshot {
                        graph: graph_index,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(graph = %graph_index, error = %err, "dropping snapshot for superseded graph");
                    return Err(err);
                }
            }
        };

        // State is released while the graph lock is awaited.
        let (result, children) = {
            let mut node_graph = graph.lock().await;
            let result = node_graph.apply_json(nodes);
            (result, node_graph.child_graphs())
        };

        let mut state = self.state.lock().await;
        let current = state
            .graphs
            .get_vertex_data(graph_index)
            .is_some_and(|stored| Arc::ptr_eq(stored, &graph));
        match &result {
            Ok(()) if current => {
                state.loaded.insert(graph_index);
                self.link_children(&mut state, graph_index, &children);
            }
            Ok(()) => debug!(graph = %graph_index, "graph replaced while applying snapshot"),
            Err(err) => warn!(graph = %graph_index, error = %err, "rejected snapshot"),
        }

        if let Some(pending) = state.pending.remove(&graph_index) {
            let status = match &result {
                Ok(()) => FetchStatus::Loaded,
                Err(err) => FetchStatus::Failed(err.to_string()),
            };
            pending.status.send_replace(status);
        } else {
            debug!(graph = %graph_index, "applied unsolicited snapshot");
        }

        result
    }

    /// Rebuilds the `ConnectedThrough` edges leaving `parent` and drops the
    /// nested graphs nothing references anymore.
    fn link_children(&self, state: &mut ManagerState, parent: GraphIndex, children: &[(NodeIndex, GraphIndex)]) {
        let stale: Vec<(GraphIndex, EdgeIndex)> = state
            .graphs
            .get_vertex(parent)
            .map(|vertex| vertex.connections_from().to_vec())
            .unwrap_or_default();
        for &(_, edge) in &stale {
            state.graphs.remove_edge(edge);
        }

        for &(node, child) in children {
            if let Err(err) = self.graph_or_placeholder(state, child) {
                warn!(graph = %parent, %node, child = %child, error = %err, "skipping nested graph");
                continue;
            }
            if let Err(err) = state.graphs.add_edge(parent, child, ConnectedThrough(node)) {
                warn!(graph = %parent, %node, child = %child, error = %err, "could not link nested graph");
            }
        }

        let mut orphans: Vec<GraphIndex> = stale.into_iter().map(|(child, _)| child).collect();
        while let Some(orphan) = orphans.pop() {
            if orphan == GraphIndex::ROOT || state.pending.contains_key(&orphan) {
                continue;
            }
            let Some(vertex) = state.graphs.get_vertex(orphan) else {
                continue;
            };
            if !vertex.connections_to().is_empty() {
                continue;
            }
            orphans.extend(vertex.connections_from().iter().map(|&(grandchild, _)| grandchild));
            state.graphs.remove_vertex(orphan);
            state.loaded.remove(&orphan);
            debug!(graph = %orphan, "dropped unreferenced nested graph");
        }
    }

    /// Nested graphs of `parent`, as `(owning node, child graph)`.
    pub async fn child_graphs(&self, parent: GraphIndex) -> Vec<(NodeIndex, GraphIndex)> {
        let state = self.state.lock().await;
        let Some(vertex) = state.graphs.get_vertex(parent) else {
            return Vec::new();
        };
        vertex
            .connections_from()
            .iter()
            .filter_map(|&(child, edge)| {
                let ConnectedThrough(node) = *state.graphs.get_edge(edge)?.data();
                Some((node, child))
            })
            .collect()
    }

    /// The graph containing `child` and the node through which it does.
    pub async fn parent_of(&self, child: GraphIndex) -> Option<(GraphIndex, NodeIndex)> {
        let state = self.state.lock().await;
        let &(parent, edge) = state.graphs.get_vertex(child)?.connections_to().first()?;
        let ConnectedThrough(node) = *state.graphs.get_edge(edge)?.data();
        Some((parent, node))
    }

    /// Processes inbound messages one at a time until the channel closes.
    ///
    /// A message that fails to apply is logged and skipped.
    pub async fn run_inbound(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<serde_json::Value>) {
        while let Some(message) = inbound.recv().await {
            if let Err(err) = self.handle_message(message).await {
                warn!(error = %err, "failed to handle inbound message");
            }
        }
        debug!("inbound channel closed");
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Flushes the dirty sets of every known graph. Returns the number of
    /// nodes sent.
    pub async fn flush_all(&self) -> Result<usize, SyncError> {
        let graphs: Vec<SharedNodeGraph> = {
            let state = self.state.lock().await;
            state
                .graphs
                .iter_vertices()
                .map(|(_, vertex)| Arc::clone(vertex.data()))
                .collect()
        };

        let mut sent = 0;
        for graph in graphs {
            let mut graph = graph.lock().await;
            sent += graph.write_changed_nodes_to_server()?;
            sent += graph.write_changed_nodes_to_server_ui()?;
        }
        Ok(sent)
    }

    /// Spawns a task calling [`flush_all`](Self::flush_all) every
    /// `flush_interval`. The task ends when the transport closes.
    pub fn spawn_flush_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match manager.flush_all().await {
                    Ok(_) => {}
                    Err(SyncError::TransportClosed) => {
                        debug!("transport closed; stopping flush loop");
                        break;
                    }
                    Err(err) => warn!(error = %err, "flush failed"),
                }
            }
        })
    }

    pub fn undo(&self) -> Result<(), SyncError> {
        self.transport.send(ClientMessage::Undo)
    }

    pub fn redo(&self) -> Result<(), SyncError> {
        self.transport.send(ClientMessage::Redo)
    }

    /// Asks the engine to save the project, to `path` or its current file.
    pub fn save(&self, path: Option<&str>) -> Result<(), SyncError> {
        self.transport.send(ClientMessage::Save {
            path: path.map(str::to_string),
        })
    }

    pub fn load(&self, path: Option<&str>) -> Result<(), SyncError> {
        self.transport.send(ClientMessage::Load {
            path: path.map(str::to_string),
        })
    }
}

async fn wait_for_fetch(status: &mut watch::Receiver<FetchStatus>) -> FetchStatus {
    match status.wait_for(|status| *status != FetchStatus::Waiting).await {
        Ok(status) => status.clone(),
        // Sender dropped without a verdict.
        Err(_) => FetchStatus::Waiting,
    }
}
