//! Integration tests for fetching, snapshot routing and flushing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;

use patchwire_core::{
    GraphIndex, NodeIndex, NodeRow, NodeWrapper, Socket, SocketRegistry, SocketValue,
    StreamSocketType,
};
use patchwire_sync::{
    ChannelTransport, EditorContext, GraphManager, NodeGraphData, SyncConfig, SyncError,
};

fn manager_with(config: SyncConfig) -> (Arc<GraphManager>, UnboundedReceiver<Value>) {
    let (transport, outbound) = ChannelTransport::new();
    let registry = Arc::new(RwLock::new(SocketRegistry::new()));
    (
        Arc::new(GraphManager::new(Arc::new(transport), registry, config)),
        outbound,
    )
}

fn manager() -> (Arc<GraphManager>, UnboundedReceiver<Value>) {
    manager_with(SyncConfig::default())
}

fn oscillator() -> NodeWrapper {
    NodeWrapper::new("OscillatorNode").with_row(NodeRow::Output {
        socket: Socket::Stream(StreamSocketType::Audio),
        default: SocketValue::None,
    })
}

fn update_graph(graph_index: GraphIndex, nodes: &NodeGraphData) -> Value {
    json!({
        "action": "graph/updateGraph",
        "payload": {
            "graphIndex": graph_index,
            "nodes": nodes,
        }
    })
}

#[tokio::test]
async fn concurrent_fetches_send_one_request() {
    let (manager, mut outbound) = manager();
    let mut nodes = NodeGraphData::new();
    nodes.add_vertex(oscillator());

    let responder = async {
        let request = outbound.recv().await.unwrap();
        assert_eq!(request["action"], "graph/get");
        assert_eq!(request["payload"]["graphIndex"], json!({"index": 0, "generation": 0}));
        manager
            .handle_message(update_graph(GraphIndex::ROOT, &nodes))
            .await
            .unwrap();
    };

    let (a, b, ()) = tokio::join!(
        manager.get_graph(GraphIndex::ROOT),
        manager.get_graph(GraphIndex::ROOT),
        responder
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.lock().await.graph().vertex_count(), 1);
    assert!(outbound.try_recv().is_err(), "second graph/get was sent");
    assert_eq!(manager.pending_fetches().await, 0);
}

#[tokio::test]
async fn loaded_graph_is_served_from_cache() {
    let (manager, mut outbound) = manager();
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &NodeGraphData::new()))
        .await
        .unwrap();

    let root = manager.get_root_graph().await.unwrap();
    assert!(root.lock().await.is_loaded());
    assert!(outbound.try_recv().is_err());
}

#[tokio::test]
async fn snapshot_preserves_surviving_handles() {
    let (manager, _outbound) = manager();
    let mut nodes = NodeGraphData::new();
    let a = nodes.add_vertex(oscillator());
    let b = nodes.add_vertex(oscillator());
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();

    nodes.remove_vertex(a);
    let c = nodes.add_vertex(oscillator());
    assert_eq!(c, NodeIndex::new(0, 1));
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();

    let root = manager.cached_graph(GraphIndex::ROOT).await.unwrap();
    let root = root.lock().await;
    assert!(root.get_node(a).is_none());
    assert_eq!(root.get_node(b), Some(&oscillator()));
    assert_eq!(root.get_node(c), Some(&oscillator()));
}

#[tokio::test]
async fn malformed_snapshot_keeps_graph_and_fails_fetch() {
    let (manager, mut outbound) = manager();
    let index = GraphIndex::new(3, 0);

    let responder = async {
        outbound.recv().await.unwrap();
        let err = manager
            .handle_message(json!({
                "action": "graph/updateGraph",
                "payload": {"graphIndex": index, "nodes": {"vertices": 12}}
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedSnapshot { .. }));
    };

    let (result, ()) = tokio::join!(manager.get_graph(index), responder);
    assert!(matches!(result.unwrap_err(), SyncError::FetchFailed { graph, .. } if graph == index));

    let graph = manager.cached_graph(index).await.unwrap();
    assert!(!graph.lock().await.is_loaded());
}

#[tokio::test(start_paused = true)]
async fn unanswered_fetch_times_out_and_can_be_retried() {
    let (manager, mut outbound) = manager_with(SyncConfig {
        fetch_timeout: Some(Duration::from_millis(50)),
        ..SyncConfig::default()
    });
    let index = GraphIndex::new(1, 0);

    let err = manager.get_graph(index).await.unwrap_err();
    assert!(matches!(err, SyncError::FetchTimedOut { graph, .. } if graph == index));
    assert_eq!(manager.pending_fetches().await, 0);
    assert_eq!(outbound.recv().await.unwrap()["action"], "graph/get");

    let responder = async {
        let retry = outbound.recv().await.unwrap();
        assert_eq!(retry["action"], "graph/get");
        manager
            .handle_message(update_graph(index, &NodeGraphData::new()))
            .await
            .unwrap();
    };
    let (result, ()) = tokio::join!(manager.get_graph(index), responder);
    assert!(result.unwrap().lock().await.is_loaded());
}

#[tokio::test(start_paused = true)]
async fn all_waiters_see_the_timeout() {
    let (manager, _outbound) = manager_with(SyncConfig {
        fetch_timeout: Some(Duration::from_millis(20)),
        ..SyncConfig::default()
    });
    let index = GraphIndex::new(2, 0);

    let (a, b) = tokio::join!(manager.get_graph(index), manager.get_graph(index));
    assert!(matches!(a.unwrap_err(), SyncError::FetchTimedOut { .. }));
    assert!(matches!(b.unwrap_err(), SyncError::FetchTimedOut { .. }));
}

#[tokio::test]
async fn nested_graphs_are_linked_to_their_parent() {
    let (manager, _outbound) = manager();
    let child = GraphIndex::new(1, 0);
    let mut nodes = NodeGraphData::new();
    let mut wrapper = NodeWrapper::new("InnerGraphNode").with_row(NodeRow::InnerGraph);
    wrapper.child_graph_index = Some(child);
    let owner = nodes.add_vertex(wrapper);

    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();

    assert_eq!(manager.child_graphs(GraphIndex::ROOT).await, vec![(owner, child)]);
    assert_eq!(manager.parent_of(child).await, Some((GraphIndex::ROOT, owner)));
    let placeholder = manager.cached_graph(child).await.unwrap();
    assert!(!placeholder.lock().await.is_loaded());

    // The owning node disappears: the link goes with it.
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &NodeGraphData::new()))
        .await
        .unwrap();
    assert!(manager.child_graphs(GraphIndex::ROOT).await.is_empty());
    assert!(manager.cached_graph(child).await.is_none());
    assert_eq!(manager.graph_indices().await, vec![GraphIndex::ROOT]);
}

#[tokio::test]
async fn referenced_nested_graph_survives_relink() {
    let (manager, _outbound) = manager();
    let child = GraphIndex::new(1, 0);
    let mut nodes = NodeGraphData::new();
    let mut wrapper = NodeWrapper::new("InnerGraphNode").with_row(NodeRow::InnerGraph);
    wrapper.child_graph_index = Some(child);
    nodes.add_vertex(wrapper);
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();
    let placeholder = manager.cached_graph(child).await.unwrap();

    nodes.add_vertex(oscillator());
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();
    let relinked = manager.cached_graph(child).await.unwrap();
    assert!(Arc::ptr_eq(&placeholder, &relinked));
}

#[tokio::test]
async fn snapshot_far_past_the_arena_is_malformed() {
    let (manager, _outbound) = manager();
    let far = GraphIndex::new(20_000_000, 0);

    let err = manager
        .handle_message(update_graph(far, &NodeGraphData::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MalformedSnapshot { graph, .. } if graph == far));
    assert!(manager.graph_indices().await.is_empty());
    assert!(manager.cached_graph(far).await.is_none());
}

#[tokio::test]
async fn held_graph_lock_does_not_block_the_manager() {
    let (manager, _outbound) = manager();
    let child = GraphIndex::new(1, 0);
    let mut nodes = NodeGraphData::new();
    let mut wrapper = NodeWrapper::new("InnerGraphNode").with_row(NodeRow::InnerGraph);
    wrapper.child_graph_index = Some(child);
    nodes.add_vertex(wrapper);
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();

    let root = manager.cached_graph(GraphIndex::ROOT).await.unwrap();
    let guard = root.lock().await;

    // A snapshot for the held graph parks behind the guard.
    nodes.add_vertex(oscillator());
    let applying = {
        let manager = Arc::clone(&manager);
        let message = update_graph(GraphIndex::ROOT, &nodes);
        tokio::spawn(async move { manager.handle_message(message).await })
    };
    tokio::task::yield_now().await;

    let opened = tokio::time::timeout(Duration::from_secs(2), async {
        let graph = manager.cached_graph(child).await;
        let root_again = manager.get_root_graph().await;
        (graph, root_again)
    })
    .await
    .expect("manager blocked behind a held graph lock");
    assert!(opened.0.is_some());
    assert!(Arc::ptr_eq(&opened.1.unwrap(), &root));

    drop(guard);
    applying.await.unwrap().unwrap();
    assert_eq!(root.lock().await.graph().vertex_count(), 2);
}

#[tokio::test]
async fn flush_all_batches_dirty_nodes() {
    let (manager, mut outbound) = manager();
    let mut nodes = NodeGraphData::new();
    let a = nodes.add_vertex(oscillator());
    let b = nodes.add_vertex(oscillator());
    manager
        .handle_message(update_graph(GraphIndex::ROOT, &nodes))
        .await
        .unwrap();

    {
        let root = manager.get_root_graph().await.unwrap();
        let mut root = root.lock().await;
        root.update_node(a, |node| node.ui_data.title = "lead".into());
        root.mark_node_as_updated(b);
        root.mark_node_as_updated(a);
        root.update_node_ui(b, |ui| ui.selected = true);
    }

    assert_eq!(manager.flush_all().await.unwrap(), 3);
    let nodes_batch = outbound.recv().await.unwrap();
    assert_eq!(nodes_batch["action"], "graph/updateNodes");
    assert_eq!(nodes_batch["payload"]["updatedNodes"].as_array().unwrap().len(), 2);
    assert_eq!(nodes_batch["payload"]["updatedNodes"][0][0]["uiData"]["title"], "lead");
    let ui_batch = outbound.recv().await.unwrap();
    assert_eq!(ui_batch["action"], "graph/updateNodesUi");

    assert_eq!(manager.flush_all().await.unwrap(), 0);
    assert!(outbound.try_recv().is_err());
}

#[tokio::test]
async fn registry_update_replaces_labels() {
    let (transport, _outbound) = ChannelTransport::new();
    let context = EditorContext::new(SyncConfig::default(), Arc::new(transport));
    let socket = Socket::Stream(StreamSocketType::Dynamic(3));
    assert_eq!(context.socket_label(&socket).await, "");

    context
        .graphs
        .handle_message(json!({
            "action": "registry/updateRegistry",
            "payload": {"name_to_socket_type": {
                "Sidechain": {"template": {"Stream": "Audio"}, "socketType": {"Stream": {"Dynamic": 3}}}
            }}
        }))
        .await
        .unwrap();

    assert_eq!(context.socket_label(&socket).await, "Sidechain");
}

#[tokio::test]
async fn malformed_message_is_reported() {
    let (manager, _outbound) = manager();
    let err = manager
        .handle_message(json!({"action": "graph/updateGraph"}))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MalformedMessage(_)));
}

#[tokio::test]
async fn inbound_loop_applies_messages_in_order() {
    let (transport, _outbound) = ChannelTransport::new();
    let context = EditorContext::new(SyncConfig::default(), Arc::new(transport));
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handles = context.start(rx);

    let mut first = NodeGraphData::new();
    first.add_vertex(oscillator());
    let mut second = first.clone();
    second.add_vertex(oscillator());

    tx.send(json!({"action": "nonsense"})).unwrap();
    tx.send(update_graph(GraphIndex::ROOT, &first)).unwrap();
    tx.send(update_graph(GraphIndex::ROOT, &second)).unwrap();
    drop(tx);

    let mut handles = handles.into_iter();
    if let Some(dispatcher) = handles.next() {
        dispatcher.await.unwrap();
    }
    for flusher in handles {
        flusher.abort();
    }

    let root = context.graphs.get_root_graph().await.unwrap();
    assert_eq!(root.lock().await.graph().vertex_count(), 2);
}

#[tokio::test]
async fn history_and_io_actions_are_forwarded() {
    let (manager, mut outbound) = manager();
    manager.undo().unwrap();
    manager.redo().unwrap();
    manager.save(Some("/tmp/song.json")).unwrap();
    manager.load(None).unwrap();

    let actions: Vec<Value> = (0..4)
        .map(|_| outbound.try_recv().unwrap()["action"].clone())
        .collect();
    assert_eq!(actions, vec!["graph/undo", "graph/redo", "io/save", "io/load"]);
}
