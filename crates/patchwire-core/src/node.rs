//! Vertex and edge payloads of the editor graph.
//!
//! [`NodeWrapper`] is what each vertex of a node graph carries: the declared
//! rows of the node type (sockets, properties, nested graph), per-instance
//! overrides of socket defaults, property values, and UI metadata.
//! [`NodeConnection`] is the edge payload naming the socket at each end.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeIndex, VertexIndex};
use crate::socket::{Socket, SocketDirection};
use crate::value::{Property, PropertyType, SocketValue};

/// One row of a node as laid out in the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeRow {
    Input {
        socket: Socket,
        default: SocketValue,
    },
    Output {
        socket: Socket,
        default: SocketValue,
    },
    #[serde(rename_all = "camelCase")]
    Property {
        name: String,
        property_type: PropertyType,
        default: Property,
    },
    /// Placeholder row for a node that owns a nested graph.
    InnerGraph,
}

impl NodeRow {
    /// The socket this row exposes, with its direction.
    pub fn socket(&self) -> Option<(Socket, SocketDirection)> {
        match self {
            NodeRow::Input { socket, .. } => Some((*socket, SocketDirection::Input)),
            NodeRow::Output { socket, .. } => Some((*socket, SocketDirection::Output)),
            NodeRow::Property { .. } | NodeRow::InnerGraph => None,
        }
    }

    pub fn matches_socket(&self, socket: &Socket, direction: SocketDirection) -> bool {
        self.socket() == Some((*socket, direction))
    }

    /// Default value of a socket row.
    pub fn socket_default(&self) -> Option<&SocketValue> {
        match self {
            NodeRow::Input { default, .. } | NodeRow::Output { default, .. } => Some(default),
            NodeRow::Property { .. } | NodeRow::InnerGraph => None,
        }
    }

    /// Default value of the property row called `property_name`.
    pub fn property_default(&self, property_name: &str) -> Option<&Property> {
        match self {
            NodeRow::Property { name, default, .. } if name == property_name => Some(default),
            _ => None,
        }
    }
}

/// Editor-side metadata of a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiData {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub title: String,
}

/// Payload of a node-graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWrapper {
    /// Registered node type name, e.g. `"OscillatorNode"`.
    pub node_type: String,
    /// Declared rows, in display order.
    pub node_rows: Vec<NodeRow>,
    /// Per-instance socket rows overriding declared defaults.
    #[serde(default)]
    pub default_overrides: Vec<NodeRow>,
    #[serde(default)]
    pub properties: IndexMap<String, Property>,
    #[serde(default)]
    pub ui_data: UiData,
    /// The nested graph this node owns, if any.
    #[serde(default)]
    pub child_graph_index: Option<VertexIndex>,
}

impl NodeWrapper {
    pub fn new(node_type: impl Into<String>) -> Self {
        NodeWrapper {
            node_type: node_type.into(),
            node_rows: Vec::new(),
            default_overrides: Vec::new(),
            properties: IndexMap::new(),
            ui_data: UiData::default(),
            child_graph_index: None,
        }
    }

    pub fn with_row(mut self, row: NodeRow) -> Self {
        self.node_rows.push(row);
        self
    }

    pub fn with_ui(mut self, ui_data: UiData) -> Self {
        self.ui_data = ui_data;
        self
    }

    /// Position of the declared row exposing `socket` on `direction`.
    pub fn row_position(&self, socket: &Socket, direction: SocketDirection) -> Option<usize> {
        self.node_rows
            .iter()
            .position(|row| row.matches_socket(socket, direction))
    }

    /// Declared sockets on one side, in row order.
    pub fn sockets(&self, direction: SocketDirection) -> impl Iterator<Item = Socket> + '_ {
        self.node_rows.iter().filter_map(move |row| match row.socket() {
            Some((socket, dir)) if dir == direction => Some(socket),
            _ => None,
        })
    }

    /// Resolves a socket's default: instance override first, then the
    /// declared row, then [`SocketValue::None`].
    pub fn socket_default(&self, socket: &Socket, direction: SocketDirection) -> SocketValue {
        self.default_overrides
            .iter()
            .chain(self.node_rows.iter())
            .find(|row| row.matches_socket(socket, direction))
            .and_then(NodeRow::socket_default)
            .cloned()
            .unwrap_or_default()
    }

    /// Sets or replaces the instance override for a socket default.
    pub fn set_socket_override(&mut self, socket: Socket, direction: SocketDirection, value: SocketValue) {
        let row = match direction {
            SocketDirection::Input => NodeRow::Input {
                socket,
                default: value,
            },
            SocketDirection::Output => NodeRow::Output {
                socket,
                default: value,
            },
        };
        match self
            .default_overrides
            .iter_mut()
            .find(|existing| existing.matches_socket(&socket, direction))
        {
            Some(existing) => *existing = row,
            None => self.default_overrides.push(row),
        }
    }

    /// Resolves a property: instance value first, then the default of the
    /// declared property row.
    pub fn property_value(&self, name: &str) -> Option<&Property> {
        self.properties
            .get(name)
            .or_else(|| self.node_rows.iter().find_map(|row| row.property_default(name)))
    }
}

/// Edge payload: the socket on each end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConnection {
    pub from_socket: Socket,
    pub to_socket: Socket,
}

/// A connection as sent on the wire: both endpoints and both sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_node: VertexIndex,
    pub to_node: VertexIndex,
    pub data: NodeConnection,
}

/// An inbound connection as seen from the receiving node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSideConnection {
    pub edge: EdgeIndex,
    pub from_node: VertexIndex,
    pub from_socket: Socket,
}

/// An outbound connection as seen from the sending node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSideConnection {
    pub edge: EdgeIndex,
    pub to_node: VertexIndex,
    pub to_socket: Socket,
}

/// Edge payload of the graph of graphs: the node through which a parent
/// graph contains a child graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectedThrough(pub VertexIndex);
