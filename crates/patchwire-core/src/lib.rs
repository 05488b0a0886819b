//! Data model for the patchwire node-graph editor.
//!
//! - [`arena`]: generational slot store with stable `(index, generation)` handles
//! - [`graph`]: directed graph over two arenas with consistent adjacency lists
//! - [`socket`]: typed connection points with canonical content keys
//! - [`socket_registry`]: names of dynamically registered sockets
//! - [`value`]: socket and property values
//! - [`node`]: vertex/edge payloads of the editor graph
//! - [`layout`]: deterministic node and socket geometry
//!
//! This crate is synchronous and does no I/O; synchronization with the
//! engine lives in `patchwire-sync`.

pub mod arena;
pub mod error;
pub mod graph;
pub mod layout;
pub mod node;
pub mod socket;
pub mod socket_registry;
pub mod value;

// Re-export commonly used types
pub use arena::{Arena, Index, Slot, MAX_SLOT_GAP};
pub use error::CoreError;
pub use graph::{Edge, EdgeIndex, Graph, Vertex, VertexIndex};
pub use layout::{NodeLayout, Point};
pub use node::{
    ConnectedThrough, Connection, InputSideConnection, NodeConnection, NodeRow, NodeWrapper,
    OutputSideConnection, UiData,
};
pub use socket::{
    socket_to_key, MidiSocketType, NodeRefSocketType, Socket, SocketDirection, SocketKind,
    StreamSocketType, ValueSocketType,
};
pub use socket_registry::{SocketRegistry, SocketRegistryEntry};
pub use value::{Primitive, Property, PropertyType, SocketValue};

/// Handle of a sub-graph in the graph of graphs.
pub type GraphIndex = VertexIndex;

/// Handle of a node within one node graph.
pub type NodeIndex = VertexIndex;
