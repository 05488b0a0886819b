//! Application root for the editor.
//!
//! [`EditorContext`] bundles the state every editor component needs: the
//! socket registry, the graph manager, and the configuration. It is cheap
//! to clone; clones share the same state.

use std::sync::Arc;

use patchwire_core::{Socket, SocketRegistry};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::manager::GraphManager;
use crate::transport::Transport;

#[derive(Clone)]
pub struct EditorContext {
    pub config: SyncConfig,
    /// Socket registry, replaced wholesale by `registry/updateRegistry`.
    pub registry: Arc<RwLock<SocketRegistry>>,
    pub graphs: Arc<GraphManager>,
}

impl EditorContext {
    pub fn new(config: SyncConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = Arc::new(RwLock::new(SocketRegistry::new()));
        let graphs = Arc::new(GraphManager::new(transport, Arc::clone(&registry), config));
        EditorContext {
            config,
            registry,
            graphs,
        }
    }

    /// Starts the inbound dispatcher and the periodic flush loop.
    pub fn start(&self, inbound: mpsc::UnboundedReceiver<serde_json::Value>) -> Vec<JoinHandle<()>> {
        let dispatcher = tokio::spawn(Arc::clone(&self.graphs).run_inbound(inbound));
        let flusher = self.graphs.spawn_flush_loop();
        vec![dispatcher, flusher]
    }

    /// Display label of a socket under the current registry.
    pub async fn socket_label(&self, socket: &Socket) -> String {
        self.registry.read().await.label(socket).into_owned()
    }
}
