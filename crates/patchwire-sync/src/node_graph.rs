//! Client-side mirror of one node graph.
//!
//! A [`NodeGraph`] holds the last snapshot the engine sent for one graph
//! index, applies optimistic local edits, and batches changed nodes back to
//! the engine. Observers subscribe to three projections of the graph:
//!
//! - `nodes`: occupied `(handle, node)` pairs in slot order
//! - `keyed_nodes` / `keyed_connections`: the same data with a stable diff
//!   key per entry, for list renderers
//!
//! Keys embed the full `index.generation` handle. A node removed and
//! replaced in the same slot therefore shows up as a removal plus an
//! insertion, never as an in-place update.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use patchwire_core::{
    Connection, EdgeIndex, Graph, GraphIndex, InputSideConnection, NodeConnection, NodeIndex,
    NodeLayout, NodeWrapper, OutputSideConnection, Point, Property, Socket, SocketDirection,
    SocketValue, UiData,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::protocol::ClientMessage;
use crate::store::Store;
use crate::transport::Transport;

/// A node graph shared between the manager and its users.
pub type SharedNodeGraph = Arc<Mutex<NodeGraph>>;

/// Graph payload as it arrives in `graph/updateGraph`.
pub type NodeGraphData = Graph<NodeWrapper, NodeConnection>;

/// A node with its diff key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedNode {
    pub key: String,
    pub index: NodeIndex,
    pub node: NodeWrapper,
}

/// A connection with its diff key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedConnection {
    pub key: String,
    pub index: EdgeIndex,
    pub connection: Connection,
}

/// Diff key of a node: `<graph>/<node>`.
pub fn node_key(graph_index: GraphIndex, node: NodeIndex) -> String {
    format!("{graph_index}/{node}")
}

/// Diff key of a connection: `<graph>/<edge>:<from socket>><to socket>`.
pub fn connection_key(graph_index: GraphIndex, edge: EdgeIndex, data: &NodeConnection) -> String {
    format!(
        "{graph_index}/{edge}:{}>{}",
        data.from_socket.to_key(),
        data.to_socket.to_key()
    )
}

pub struct NodeGraph {
    graph_index: GraphIndex,
    graph: NodeGraphData,
    loaded: bool,
    dirty_nodes: IndexSet<NodeIndex>,
    dirty_ui: IndexSet<NodeIndex>,
    transport: Arc<dyn Transport>,
    layout: NodeLayout,
    node_store: Store<Vec<(NodeIndex, NodeWrapper)>>,
    keyed_nodes: Store<Vec<KeyedNode>>,
    keyed_connections: Store<Vec<KeyedConnection>>,
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("graph_index", &self.graph_index)
            .field("loaded", &self.loaded)
            .field("nodes", &self.graph.vertex_count())
            .field("connections", &self.graph.edge_count())
            .field("dirty_nodes", &self.dirty_nodes.len())
            .field("dirty_ui", &self.dirty_ui.len())
            .finish()
    }
}

impl NodeGraph {
    /// Creates an empty, not-yet-loaded graph.
    pub fn new(graph_index: GraphIndex, transport: Arc<dyn Transport>, layout: NodeLayout) -> Self {
        NodeGraph {
            graph_index,
            graph: Graph::new(),
            loaded: false,
            dirty_nodes: IndexSet::new(),
            dirty_ui: IndexSet::new(),
            transport,
            layout,
            node_store: Store::new(Vec::new()),
            keyed_nodes: Store::new(Vec::new()),
            keyed_connections: Store::new(Vec::new()),
        }
    }

    pub fn graph_index(&self) -> GraphIndex {
        self.graph_index
    }

    /// Whether at least one snapshot has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Read-only view of the underlying graph.
    pub fn graph(&self) -> &NodeGraphData {
        &self.graph
    }

    pub fn get_node(&self, index: NodeIndex) -> Option<&NodeWrapper> {
        self.graph.get_vertex_data(index)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &NodeWrapper)> + '_ {
        self.graph.iter_vertices().map(|(index, vertex)| (index, vertex.data()))
    }

    /// Nested graphs referenced by nodes of this graph, as `(node, child)`.
    pub fn child_graphs(&self) -> Vec<(NodeIndex, GraphIndex)> {
        self.nodes()
            .filter_map(|(index, node)| node.child_graph_index.map(|child| (index, child)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Replaces the whole graph with a snapshot from the engine.
    ///
    /// The snapshot is parsed and validated before anything is touched; on
    /// error the current graph stays as it was.
    pub fn apply_json(&mut self, snapshot: serde_json::Value) -> Result<(), SyncError> {
        let graph: NodeGraphData = serde_json::from_value(snapshot).map_err(|err| {
            SyncError::MalformedSnapshot {
                graph: self.graph_index,
                reason: err.to_string(),
            }
        })?;
        graph
            .check_consistency()
            .map_err(|err| SyncError::MalformedSnapshot {
                graph: self.graph_index,
                reason: err.to_string(),
            })?;

        self.graph = graph;
        self.loaded = true;

        // Marks for nodes the engine no longer has cannot be flushed.
        let graph = &self.graph;
        self.dirty_nodes.retain(|index| graph.contains_vertex(*index));
        self.dirty_ui.retain(|index| graph.contains_vertex(*index));

        self.publish();
        debug!(
            graph = %self.graph_index,
            nodes = self.graph.vertex_count(),
            connections = self.graph.edge_count(),
            "applied snapshot"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    pub fn subscribe_nodes(&self) -> watch::Receiver<Vec<(NodeIndex, NodeWrapper)>> {
        self.node_store.subscribe()
    }

    pub fn subscribe_keyed_nodes(&self) -> watch::Receiver<Vec<KeyedNode>> {
        self.keyed_nodes.subscribe()
    }

    pub fn subscribe_keyed_connections(&self) -> watch::Receiver<Vec<KeyedConnection>> {
        self.keyed_connections.subscribe()
    }

    fn publish(&self) {
        let nodes: Vec<(NodeIndex, NodeWrapper)> = self
            .graph
            .iter_vertices()
            .map(|(index, vertex)| (index, vertex.data().clone()))
            .collect();
        let keyed_nodes = nodes
            .iter()
            .map(|(index, node)| KeyedNode {
                key: node_key(self.graph_index, *index),
                index: *index,
                node: node.clone(),
            })
            .collect();
        let keyed_connections = self
            .graph
            .iter_edges()
            .map(|(index, edge)| KeyedConnection {
                key: connection_key(self.graph_index, index, edge.data()),
                index,
                connection: Connection {
                    from_node: edge.from(),
                    to_node: edge.to(),
                    data: *edge.data(),
                },
            })
            .collect();

        self.node_store.publish(nodes);
        self.keyed_nodes.publish(keyed_nodes);
        self.keyed_connections.publish(keyed_connections);
    }

    // -----------------------------------------------------------------------
    // Dirty tracking
    // -----------------------------------------------------------------------

    /// Queues a node for the next `graph/updateNodes` batch.
    pub fn mark_node_as_updated(&mut self, index: NodeIndex) {
        self.dirty_nodes.insert(index);
    }

    /// Queues a node for the next `graph/updateNodesUi` batch.
    pub fn mark_node_ui_as_updated(&mut self, index: NodeIndex) {
        self.dirty_ui.insert(index);
    }

    pub fn pending_node_updates(&self) -> usize {
        self.dirty_nodes.len()
    }

    pub fn pending_ui_updates(&self) -> usize {
        self.dirty_ui.len()
    }

    /// Sends every dirty node in one `graph/updateNodes` message.
    ///
    /// Returns the number of nodes sent. Nothing is sent if nothing is
    /// dirty or every dirty handle has gone stale.
    pub fn write_changed_nodes_to_server(&mut self) -> Result<usize, SyncError> {
        let updated_nodes = self.drain_dirty(false);
        if updated_nodes.is_empty() {
            return Ok(0);
        }
        let count = updated_nodes.len();
        self.transport.send(ClientMessage::UpdateNodes {
            graph_index: self.graph_index,
            updated_nodes,
        })?;
        debug!(graph = %self.graph_index, count, "flushed node updates");
        Ok(count)
    }

    /// Sends every node with dirty UI data in one `graph/updateNodesUi`
    /// message.
    pub fn write_changed_nodes_to_server_ui(&mut self) -> Result<usize, SyncError> {
        let updated_nodes = self.drain_dirty(true);
        if updated_nodes.is_empty() {
            return Ok(0);
        }
        let count = updated_nodes.len();
        self.transport.send(ClientMessage::UpdateNodesUi {
            graph_index: self.graph_index,
            updated_nodes,
        })?;
        debug!(graph = %self.graph_index, count, "flushed ui updates");
        Ok(count)
    }

    /// Takes the dirty set and resolves it against the current graph.
    fn drain_dirty(&mut self, ui: bool) -> Vec<(NodeWrapper, NodeIndex)> {
        let dirty = if ui {
            std::mem::take(&mut self.dirty_ui)
        } else {
            std::mem::take(&mut self.dirty_nodes)
        };
        dirty
            .into_iter()
            .filter_map(|index| {
                self.graph
                    .get_vertex_data(index)
                    .map(|node| (node.clone(), index))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The connection feeding `socket` on `index`.
    ///
    /// If several edges target the same input, the one with the lowest edge
    /// handle wins.
    pub fn get_node_input_connection(&self, index: NodeIndex, socket: &Socket) -> Option<InputSideConnection> {
        let vertex = self.graph.get_vertex(index)?;
        let mut matches = vertex.connections_to().iter().filter_map(|&(from_node, edge)| {
            let data = self.graph.get_edge(edge)?.data();
            (data.to_socket == *socket).then_some(InputSideConnection {
                edge,
                from_node,
                from_socket: data.from_socket,
            })
        });

        let first = matches.next()?;
        let mut ambiguous = false;
        let chosen = matches.fold(first, |best, candidate| {
            ambiguous = true;
            if candidate.edge < best.edge {
                candidate
            } else {
                best
            }
        });
        if ambiguous {
            warn!(
                graph = %self.graph_index,
                node = %index,
                socket = %socket,
                edge = %chosen.edge,
                "input socket has several connections"
            );
        }
        Some(chosen)
    }

    /// All connections leaving `socket` on `index`, in adjacency order.
    pub fn get_node_output_connections(&self, index: NodeIndex, socket: &Socket) -> Vec<OutputSideConnection> {
        let Some(vertex) = self.graph.get_vertex(index) else {
            return Vec::new();
        };
        vertex
            .connections_from()
            .iter()
            .filter_map(|&(to_node, edge)| {
                let data = self.graph.get_edge(edge)?.data();
                (data.from_socket == *socket).then_some(OutputSideConnection {
                    edge,
                    to_node,
                    to_socket: data.to_socket,
                })
            })
            .collect()
    }

    /// Effective default of a socket, or [`SocketValue::None`] if the node or
    /// socket does not exist.
    pub fn get_node_socket_default(&self, index: NodeIndex, socket: &Socket, direction: SocketDirection) -> SocketValue {
        self.get_node(index)
            .map(|node| node.socket_default(socket, direction))
            .unwrap_or_default()
    }

    pub fn get_node_property_value(&self, index: NodeIndex, name: &str) -> Option<Property> {
        self.get_node(index)?.property_value(name).cloned()
    }

    /// Socket anchor in editor coordinates; the origin if the node or socket
    /// does not exist.
    pub fn get_node_socket_xy(&self, index: NodeIndex, socket: &Socket, direction: SocketDirection) -> Point {
        self.get_node(index)
            .and_then(|node| self.layout.socket_xy(node, socket, direction))
            .unwrap_or(Point::ORIGIN)
    }

    // -----------------------------------------------------------------------
    // Local edits
    // -----------------------------------------------------------------------

    /// Asks the engine for a new node. It appears with the next snapshot.
    pub fn request_new_node(&self, node_type: &str, ui_data: UiData) -> Result<(), SyncError> {
        self.transport.send(ClientMessage::NewNode {
            graph_index: self.graph_index,
            node_type: node_type.to_string(),
            ui_data,
        })
    }

    /// Removes a node and its connections locally and tells the engine.
    ///
    /// Returns `Ok(None)` without sending anything for a stale handle.
    pub fn remove_node(&mut self, index: NodeIndex) -> Result<Option<NodeWrapper>, SyncError> {
        let Some(node) = self.graph.remove_vertex(index) else {
            return Ok(None);
        };
        self.dirty_nodes.shift_remove(&index);
        self.dirty_ui.shift_remove(&index);
        self.publish();

        self.transport.send(ClientMessage::RemoveNode {
            graph_index: self.graph_index,
            node_index: index,
        })?;
        Ok(Some(node))
    }

    /// Connects two sockets locally and tells the engine.
    pub fn connect(
        &mut self,
        from_node: NodeIndex,
        from_socket: Socket,
        to_node: NodeIndex,
        to_socket: Socket,
    ) -> Result<EdgeIndex, SyncError> {
        let data = NodeConnection {
            from_socket,
            to_socket,
        };
        let edge = self.graph.add_edge(from_node, to_node, data)?;
        self.publish();

        self.transport.send(ClientMessage::ConnectNode {
            graph_index: self.graph_index,
            connection: Connection {
                from_node,
                to_node,
                data,
            },
        })?;
        Ok(edge)
    }

    /// Removes a connection locally and tells the engine.
    pub fn disconnect(&mut self, edge: EdgeIndex) -> Result<Option<Connection>, SyncError> {
        let Some((from_node, to_node)) = self.graph.get_edge(edge).map(|e| (e.from(), e.to())) else {
            return Ok(None);
        };
        let Some(data) = self.graph.remove_edge(edge) else {
            return Ok(None);
        };
        self.publish();

        let connection = Connection {
            from_node,
            to_node,
            data,
        };
        self.transport.send(ClientMessage::DisconnectNode {
            graph_index: self.graph_index,
            connection,
        })?;
        Ok(Some(connection))
    }

    /// Edits a node in place and queues it for the next flush.
    ///
    /// Returns `false` for a stale handle.
    pub fn update_node(&mut self, index: NodeIndex, edit: impl FnOnce(&mut NodeWrapper)) -> bool {
        let Some(node) = self.graph.get_vertex_data_mut(index) else {
            return false;
        };
        edit(node);
        self.mark_node_as_updated(index);
        self.publish();
        true
    }

    /// Edits a node's UI data and queues it for the next UI flush.
    pub fn update_node_ui(&mut self, index: NodeIndex, edit: impl FnOnce(&mut UiData)) -> bool {
        let Some(node) = self.graph.get_vertex_data_mut(index) else {
            return false;
        };
        edit(&mut node.ui_data);
        self.mark_node_ui_as_updated(index);
        self.publish();
        true
    }
}
