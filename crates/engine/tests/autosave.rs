//! Autosave timing against the in-memory store, on paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use canvasgen_core::backend::CanvasStore;
use canvasgen_core::canvas::Canvas;
use canvasgen_core::event_types;
use canvasgen_core::job::JobUpdate;
use canvasgen_core::node::{NewNode, NodeKind, NodeStatus};
use canvasgen_engine::MemoryCanvasStore;
use uuid::Uuid;

use common::{harness, harness_with_store, settle};

#[tokio::test(start_paused = true)]
async fn change_is_saved_after_debounce() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let mut events = h.engine.events().subscribe();

    session
        .create_node(NodeKind::Image, NewNode::default())
        .await
        .unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;
    assert_eq!(h.store.save_count(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(h.store.save_count(), 1);

    let saved = h.store.get(canvas_id).await.unwrap();
    assert_eq!(saved.nodes.len(), 1);

    let mut saw_saved = false;
    while let Ok(event) = events.try_recv() {
        saw_saved |= event.event_type == event_types::CANVAS_SAVED;
    }
    assert!(saw_saved);
}

/// Edits arriving within the debounce window collapse into one save.
#[tokio::test(start_paused = true)]
async fn burst_of_edits_saves_once() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session
        .create_node(NodeKind::Image, NewNode::default())
        .await
        .unwrap();

    for i in 0..4 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.update_prompt(&node.id, format!("draft {i}")).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    assert_eq!(h.store.save_count(), 1);
    assert_eq!(h.store.get(canvas_id).await.unwrap().nodes[0].prompt, "draft 3");
}

#[tokio::test(start_paused = true)]
async fn clean_canvas_is_not_saved() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    h.engine.session(canvas_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(65)).await;
    settle().await;
    assert_eq!(h.store.save_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn closing_flushes_unsaved_changes() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    session
        .create_node(NodeKind::Video, NewNode::default())
        .await
        .unwrap();

    assert!(h.engine.sessions().close(canvas_id).await);
    assert_eq!(h.store.save_count(), 1);
    assert_eq!(h.engine.sessions().open_count().await, 0);
}

/// A node saved as `Generating` is tracked again when its canvas reopens,
/// so the poll can pick up a result that arrived while it was closed.
#[tokio::test(start_paused = true)]
async fn reopened_canvas_resumes_generating_node() {
    let store = Arc::new(MemoryCanvasStore::new());
    let canvas_id = Uuid::new_v4();

    let node_id = {
        let mut canvas = Canvas::new(canvas_id);
        let node = canvas.create(NodeKind::Image, NewNode::default());
        canvas
            .start_generation(
                &node.id,
                canvasgen_core::canvas::GenerationRequest {
                    prompt: "a".into(),
                    model_id: "flux".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        store.save(canvas_id, &canvas.snapshot()).await.unwrap();
        node.id
    };

    let h = harness_with_store(store);
    h.backend
        .set_status(JobUpdate::completed(node_id.clone(), "https://cdn/while-away.png"));

    let session = h.engine.session(canvas_id).await.unwrap();
    assert!(h.engine.reconciler().is_tracking(&node_id));

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    let node = session.node(&node_id).await.unwrap();
    assert_eq!(node.status, NodeStatus::Completed);
    assert_eq!(node.result_url.as_deref(), Some("https://cdn/while-away.png"));
}
