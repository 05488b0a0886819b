//! Outbound message transport.
//!
//! The sync layer never talks to a socket directly. It hands
//! [`ClientMessage`]s to a [`Transport`], which is expected to deliver them
//! to the engine in order.

use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::protocol::ClientMessage;

/// Delivers editor messages to the engine.
pub trait Transport: Send + Sync {
    fn send(&self, message: ClientMessage) -> Result<(), SyncError>;
}

/// Encodes each message to JSON and forwards it on an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<serde_json::Value>,
}

impl ChannelTransport {
    /// Creates a transport and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTransport { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<serde_json::Value>) -> Self {
        ChannelTransport { tx }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: ClientMessage) -> Result<(), SyncError> {
        let value = serde_json::to_value(&message)?;
        self.tx.send(value).map_err(|_| SyncError::TransportClosed)
    }
}

/// Drops every message. Used when replaying recorded engine output offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, message: ClientMessage) -> Result<(), SyncError> {
        tracing::trace!(action = message.action(), "discarding outbound message");
        Ok(())
    }
}
