//! Error types for the synchronization layer.
//!
//! [`SyncError`] wraps [`CoreError`] for structural violations and adds the
//! failure modes of talking to the engine: unparseable messages, snapshots
//! that fail validation, and sub-graph fetches that never complete.

use std::time::Duration;

use patchwire_core::{CoreError, GraphIndex};
use thiserror::Error;

/// Errors produced by patchwire-sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A graph-level invariant was violated (e.g. dangling endpoint).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A snapshot failed to deserialize or validate. The previous graph
    /// state is kept.
    #[error("malformed snapshot for graph {graph}: {reason}")]
    MalformedSnapshot { graph: GraphIndex, reason: String },

    /// An inbound message could not be parsed.
    #[error("malformed message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    /// An outbound message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// No snapshot arrived for a requested sub-graph in time.
    #[error("fetch of graph {graph} timed out after {after:?}")]
    FetchTimedOut { graph: GraphIndex, after: Duration },

    /// The snapshot answering a fetch was rejected.
    #[error("fetch of graph {graph} failed: {reason}")]
    FetchFailed { graph: GraphIndex, reason: String },

    /// The outbound channel to the engine is gone.
    #[error("transport closed")]
    TransportClosed,

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: '{value}'")]
    InvalidConfig { key: String, value: String },
}
