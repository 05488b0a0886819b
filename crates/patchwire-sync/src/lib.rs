//! Keeps the editor's node graphs in sync with the audio engine.
//!
//! The engine is authoritative: it pushes whole-graph snapshots
//! (`graph/updateGraph`) which replace the local copy. Local edits are
//! applied optimistically and sent as fire-and-forget messages; changed
//! nodes are batched through per-graph dirty sets.
//!
//! - [`node_graph`]: one graph, its observers and its dirty sets
//! - [`manager`]: the graph of graphs and de-duplicated fetching
//! - [`protocol`]: wire messages
//! - [`transport`]: outbound delivery
//! - [`context`]: application root wiring everything together

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod node_graph;
pub mod protocol;
pub mod store;
pub mod transport;

pub use config::SyncConfig;
pub use context::EditorContext;
pub use error::SyncError;
pub use manager::GraphManager;
pub use node_graph::{KeyedConnection, KeyedNode, NodeGraph, NodeGraphData, SharedNodeGraph};
pub use protocol::{ClientMessage, ServerMessage};
pub use transport::{ChannelTransport, NullTransport, Transport};
