//! Core error types for patchwire-core.
//!
//! Lookups with bad handles are not errors (they return `None`); only
//! structural violations surface here.

use thiserror::Error;

use crate::arena::Index;
use crate::graph::VertexIndex;

/// Errors produced by the patchwire-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An edge endpoint does not resolve to a live vertex.
    #[error("dangling endpoint: vertex {vertex} does not exist")]
    DanglingEndpoint { vertex: VertexIndex },

    /// A handle is older than the slot it points at.
    #[error("stale handle: {index} is behind slot generation {current}")]
    StaleHandle { index: Index, current: u32 },

    /// A handle points so far past the end of the arena that mirroring it
    /// would allocate an unbounded run of open slots.
    #[error("handle out of range: {index} is too far past the {slots} slot(s) in use")]
    HandleOutOfRange { index: Index, slots: usize },

    /// Adjacency lists and the edge arena disagree.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },

    /// A socket name is already registered.
    #[error("duplicate socket name: '{name}'")]
    DuplicateSocketName { name: String },

    /// Every dynamic socket uid has been handed out.
    #[error("socket uids exhausted: cannot register '{name}'")]
    SocketUidExhausted { name: String },
}
