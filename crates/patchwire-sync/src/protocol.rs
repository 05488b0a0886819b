//! Messages exchanged with the audio engine.
//!
//! Every message is a JSON object `{ "action": <string>, "payload": <object?> }`
//! with camelCase payload fields. [`ClientMessage`] covers what the editor
//! sends; [`ServerMessage`] covers what the engine pushes back.

use patchwire_core::{Connection, GraphIndex, NodeIndex, NodeWrapper, UiData};
use serde::{Deserialize, Serialize};

/// Editor → engine. All are fire-and-forget; effects come back as snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum ClientMessage {
    /// Create a node; the engine assigns its handle.
    #[serde(rename = "graph/newNode", rename_all = "camelCase")]
    NewNode {
        graph_index: GraphIndex,
        node_type: String,
        ui_data: UiData,
    },

    #[serde(rename = "graph/removeNode", rename_all = "camelCase")]
    RemoveNode {
        graph_index: GraphIndex,
        node_index: NodeIndex,
    },

    /// Full node payloads of everything marked dirty since the last flush.
    #[serde(rename = "graph/updateNodes", rename_all = "camelCase")]
    UpdateNodes {
        graph_index: GraphIndex,
        updated_nodes: Vec<(NodeWrapper, NodeIndex)>,
    },

    /// Same shape as `UpdateNodes`; the engine only reads `uiData`.
    #[serde(rename = "graph/updateNodesUi", rename_all = "camelCase")]
    UpdateNodesUi {
        graph_index: GraphIndex,
        updated_nodes: Vec<(NodeWrapper, NodeIndex)>,
    },

    #[serde(rename = "graph/connectNode", rename_all = "camelCase")]
    ConnectNode {
        graph_index: GraphIndex,
        connection: Connection,
    },

    #[serde(rename = "graph/disconnectNode", rename_all = "camelCase")]
    DisconnectNode {
        graph_index: GraphIndex,
        connection: Connection,
    },

    /// Ask for a snapshot of one graph.
    #[serde(rename = "graph/get", rename_all = "camelCase")]
    GetGraph { graph_index: GraphIndex },

    #[serde(rename = "graph/undo")]
    Undo,

    #[serde(rename = "graph/redo")]
    Redo,

    #[serde(rename = "io/save")]
    Save {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    #[serde(rename = "io/load")]
    Load {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

impl ClientMessage {
    /// The `action` string this message is sent under.
    pub fn action(&self) -> &'static str {
        match self {
            ClientMessage::NewNode { .. } => "graph/newNode",
            ClientMessage::RemoveNode { .. } => "graph/removeNode",
            ClientMessage::UpdateNodes { .. } => "graph/updateNodes",
            ClientMessage::UpdateNodesUi { .. } => "graph/updateNodesUi",
            ClientMessage::ConnectNode { .. } => "graph/connectNode",
            ClientMessage::DisconnectNode { .. } => "graph/disconnectNode",
            ClientMessage::GetGraph { .. } => "graph/get",
            ClientMessage::Undo => "graph/undo",
            ClientMessage::Redo => "graph/redo",
            ClientMessage::Save { .. } => "io/save",
            ClientMessage::Load { .. } => "io/load",
        }
    }
}

/// Engine → editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum ServerMessage {
    /// Authoritative snapshot of one graph. `nodes` is kept as raw JSON so
    /// the receiving graph can validate it before swapping it in.
    #[serde(rename = "graph/updateGraph", rename_all = "camelCase")]
    UpdateGraph {
        graph_index: GraphIndex,
        nodes: serde_json::Value,
    },

    /// Full socket registry; replaces the current one.
    #[serde(rename = "registry/updateRegistry")]
    UpdateRegistry(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_graph_wire_shape() {
        let message = ClientMessage::GetGraph {
            graph_index: GraphIndex::new(2, 1),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"action": "graph/get", "payload": {"graphIndex": {"index": 2, "generation": 1}}})
        );
    }

    #[test]
    fn unit_actions_carry_no_payload() {
        let value = serde_json::to_value(ClientMessage::Undo).unwrap();
        assert_eq!(value, json!({"action": "graph/undo"}));

        let back: ClientMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, ClientMessage::Undo);
    }

    #[test]
    fn save_without_path_omits_it() {
        let value = serde_json::to_value(ClientMessage::Save { path: None }).unwrap();
        assert_eq!(value, json!({"action": "io/save", "payload": {}}));
    }

    #[test]
    fn update_nodes_is_a_list_of_pairs() {
        let message = ClientMessage::UpdateNodes {
            graph_index: GraphIndex::ROOT,
            updated_nodes: vec![(NodeWrapper::new("GainNode"), NodeIndex::new(3, 0))],
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["action"], "graph/updateNodes");
        assert_eq!(value["payload"]["updatedNodes"][0][0]["nodeType"], "GainNode");
        assert_eq!(value["payload"]["updatedNodes"][0][1], json!({"index": 3, "generation": 0}));
    }

    #[test]
    fn action_matches_serialized_tag() {
        let message = ClientMessage::RemoveNode {
            graph_index: GraphIndex::ROOT,
            node_index: NodeIndex::new(1, 4),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["action"], message.action());
        assert_eq!(value["payload"]["nodeIndex"]["generation"], 4);
    }

    #[test]
    fn parses_update_graph() {
        let message: ServerMessage = serde_json::from_value(json!({
            "action": "graph/updateGraph",
            "payload": {
                "graphIndex": {"index": 0, "generation": 0},
                "nodes": {"vertices": [], "edges": []}
            }
        }))
        .unwrap();
        match message {
            ServerMessage::UpdateGraph { graph_index, nodes } => {
                assert_eq!(graph_index, GraphIndex::ROOT);
                assert_eq!(nodes["vertices"], json!([]));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<ServerMessage, _> =
            serde_json::from_value(json!({"action": "graph/explode", "payload": {}}));
        assert!(result.is_err());
    }
}
