//! Human- and machine-readable summaries of node graphs.

use std::fmt;

use patchwire_core::{GraphIndex, NodeIndex, SocketDirection};
use patchwire_sync::{NodeGraph, ServerMessage};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub handle: String,
    pub node_type: String,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub inputs: usize,
    pub outputs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_graph: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionReport {
    pub handle: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct GraphReport {
    pub graph: String,
    pub loaded: bool,
    pub nodes: Vec<NodeReport>,
    pub connections: Vec<ConnectionReport>,
    /// Owning `(graph, node)` of a nested graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<(String, String)>,
}

impl GraphReport {
    pub fn from_graph(graph: &NodeGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|(index, node)| NodeReport {
                handle: index.to_string(),
                node_type: node.node_type.clone(),
                title: node.ui_data.title.clone(),
                x: node.ui_data.x,
                y: node.ui_data.y,
                inputs: node.sockets(SocketDirection::Input).count(),
                outputs: node.sockets(SocketDirection::Output).count(),
                child_graph: node.child_graph_index.map(|child| child.to_string()),
            })
            .collect();
        let connections = graph
            .graph()
            .iter_edges()
            .map(|(index, edge)| ConnectionReport {
                handle: index.to_string(),
                from: endpoint(edge.from(), &edge.data().from_socket.to_key()),
                to: endpoint(edge.to(), &edge.data().to_socket.to_key()),
            })
            .collect();

        GraphReport {
            graph: graph.graph_index().to_string(),
            loaded: graph.is_loaded(),
            nodes,
            connections,
            parent: None,
        }
    }

    /// Records the graph and node owning this graph.
    pub fn with_parent(mut self, parent: Option<(GraphIndex, NodeIndex)>) -> Self {
        self.parent = parent.map(|(graph, node)| (graph.to_string(), node.to_string()));
        self
    }
}

fn endpoint(node: NodeIndex, socket_key: &str) -> String {
    format!("{node}[{socket_key}]")
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph {}", self.graph)?;
        if !self.loaded {
            write!(f, " (not loaded)")?;
        }
        if let Some((graph, node)) = &self.parent {
            write!(f, " inside {graph} via node {node}")?;
        }
        writeln!(f)?;

        writeln!(f, "  {} node(s)", self.nodes.len())?;
        for node in &self.nodes {
            write!(
                f,
                "    {:<8} {:<20} in={} out={} at ({}, {})",
                node.handle, node.node_type, node.inputs, node.outputs, node.x, node.y
            )?;
            if !node.title.is_empty() {
                write!(f, " \"{}\"", node.title)?;
            }
            if let Some(child) = &node.child_graph {
                write!(f, " -> graph {child}")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "  {} connection(s)", self.connections.len())?;
        for connection in &self.connections {
            writeln!(f, "    {:<8} {} -> {}", connection.handle, connection.from, connection.to)?;
        }
        Ok(())
    }
}

/// Splits a snapshot file into its graph index and graph payload.
///
/// Accepts either a bare graph or a whole `graph/updateGraph` message; a bare
/// graph is taken to be the root graph.
pub fn snapshot_payload(value: serde_json::Value) -> Result<(GraphIndex, serde_json::Value), String> {
    if value.get("action").is_none() {
        return Ok((GraphIndex::ROOT, value));
    }
    match serde_json::from_value::<ServerMessage>(value) {
        Ok(ServerMessage::UpdateGraph { graph_index, nodes }) => Ok((graph_index, nodes)),
        Ok(other) => Err(format!("expected graph/updateGraph, got {other:?}")),
        Err(e) => Err(format!("malformed message: {e}")),
    }
}
