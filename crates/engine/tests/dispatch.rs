//! Dispatch: prerequisite checks, credit, submission and its failure paths.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use canvasgen_core::canvas::GenerationRequest;
use canvasgen_core::error::CoreError;
use canvasgen_core::job::JobUpdate;
use canvasgen_core::node::{NewNode, NodeKind, NodeStatus};
use canvasgen_core::parameters::ParamValue;
use canvasgen_core::references::{ReferenceAsset, ReferenceKind};
use uuid::Uuid;

use common::{harness, settle};

fn prompt(text: &str) -> NewNode {
    NewNode {
        prompt: text.into(),
        ..NewNode::default()
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn dispatch_moves_node_to_generating_and_submits() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("a fox")).await.unwrap();
    assert_eq!(node.model_id, "flux");

    let ack = h.engine.dispatch(canvas_id, &node.id, None).await.unwrap();
    assert!(ack.accepted);

    let stored = session.node(&node.id).await.unwrap();
    assert_eq!(stored.status, NodeStatus::Generating);
    assert!(h.engine.reconciler().is_tracking(&node.id));
    assert!(h.feed.is_watching(&node.id));

    let submitted = h.backend.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].prompt, "a fox");
    assert_eq!(
        submitted[0].parameters.get("aspect_ratio"),
        Some(&ParamValue::from("1:1"))
    );
}

#[tokio::test(start_paused = true)]
async fn explicit_request_overrides_stored_properties() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("old")).await.unwrap();

    let request = GenerationRequest {
        prompt: "new prompt".into(),
        model_id: "flux".into(),
        parameters: [("aspect_ratio".to_string(), ParamValue::from("16:9"))].into(),
    };
    h.engine
        .dispatch(canvas_id, &node.id, Some(request))
        .await
        .unwrap();

    let stored = session.node(&node.id).await.unwrap();
    assert_eq!(stored.prompt, "new prompt");
    assert_eq!(h.backend.submitted()[0].prompt, "new prompt");
}

#[tokio::test(start_paused = true)]
async fn video_frames_are_submitted_first_then_last() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Video, prompt("dolly in")).await.unwrap();

    session
        .add_reference(&node.id, ReferenceAsset::new("https://cdn/end.png", ReferenceKind::EndFrame))
        .await
        .unwrap();
    session
        .add_reference(&node.id, ReferenceAsset::new("https://cdn/start.png", ReferenceKind::StartFrame))
        .await
        .unwrap();

    h.engine.dispatch(canvas_id, &node.id, None).await.unwrap();
    assert_eq!(
        h.backend.submitted()[0].references,
        vec!["https://cdn/start.png".to_string(), "https://cdn/end.png".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn second_dispatch_is_a_concurrency_violation() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let a = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();
    let b = session.create_node(NodeKind::Image, prompt("b")).await.unwrap();

    h.engine.dispatch(canvas_id, &a.id, None).await.unwrap();
    let err = h.engine.dispatch(canvas_id, &b.id, None).await.unwrap_err();
    assert_matches!(err, CoreError::ConcurrencyViolation { ref active, .. } if *active == a.id);

    assert_eq!(session.node(&b.id).await.unwrap().status, NodeStatus::Idle);
    assert_eq!(h.backend.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn insufficient_credit_leaves_node_idle() {
    let h = harness();
    h.ledger.balance.store(3, Ordering::SeqCst);
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();

    let err = h.engine.dispatch(canvas_id, &node.id, None).await.unwrap_err();
    assert_matches!(err, CoreError::InsufficientCredit { required: 4, available: 3 });
    assert_eq!(session.node(&node.id).await.unwrap().status, NodeStatus::Idle);
    assert!(h.backend.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreachable_ledger_does_not_block_dispatch() {
    let h = harness();
    h.ledger.offline.store(true, Ordering::SeqCst);
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();

    assert!(h.engine.dispatch(canvas_id, &node.id, None).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn unknown_model_is_missing_prerequisite() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();

    let request = GenerationRequest {
        prompt: "a".into(),
        model_id: "kling".into(),
        ..GenerationRequest::default()
    };
    let err = h
        .engine
        .dispatch(canvas_id, &node.id, Some(request))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::MissingPrerequisite(_));

    let empty = GenerationRequest::default();
    let err = h
        .engine
        .dispatch(canvas_id, &node.id, Some(empty))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::MissingPrerequisite(_));
}

#[tokio::test(start_paused = true)]
async fn missing_node_is_stale_reference() {
    let h = harness();
    let err = h
        .engine
        .dispatch(Uuid::new_v4(), "node:gone", None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::StaleNodeReference(_));
}

/// A rejected submit moves the node to `Failed` and stops its tracker.
#[tokio::test(start_paused = true)]
async fn rejected_submission_fails_node_and_releases_tracking() {
    let h = harness();
    h.backend.reject.store(true, Ordering::SeqCst);
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();

    let err = h.engine.dispatch(canvas_id, &node.id, None).await.unwrap_err();
    assert_matches!(err, CoreError::DispatchFailure(ref msg) if msg == "queue full");
    assert_eq!(session.node(&node.id).await.unwrap().status, NodeStatus::Failed);

    settle().await;
    assert!(!h.engine.reconciler().is_tracking(&node.id));
    assert!(!h.feed.is_watching(&node.id));

    // A failed node may be re-run.
    h.backend.reject.store(false, Ordering::SeqCst);
    assert!(h.engine.dispatch(canvas_id, &node.id, None).await.is_ok());
}

/// A backend that never answers must not leave the node in `Generating`;
/// the deadline fails it and frees the canvas.
#[tokio::test(start_paused = true)]
async fn unanswered_submission_times_out_and_fails_node() {
    let h = harness();
    h.backend.hang.store(true, Ordering::SeqCst);
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();

    let err = h.engine.dispatch(canvas_id, &node.id, None).await.unwrap_err();
    assert_matches!(err, CoreError::DispatchFailure(ref msg) if msg.contains("did not answer"));
    assert_eq!(session.node(&node.id).await.unwrap().status, NodeStatus::Failed);
    settle().await;
    assert!(!h.engine.reconciler().is_tracking(&node.id));
}

/// Dropping the dispatch future (a client hanging up) does not stop the
/// submission task, which still settles the node.
#[tokio::test(start_paused = true)]
async fn abandoned_dispatch_still_releases_the_canvas() {
    let h = harness();
    h.backend.hang.store(true, Ordering::SeqCst);
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let a = session.create_node(NodeKind::Image, prompt("a")).await.unwrap();
    let b = session.create_node(NodeKind::Image, prompt("b")).await.unwrap();

    // The caller gives up long before the backend would have answered.
    let gave_up = tokio::time::timeout(
        Duration::from_secs(1),
        h.engine.dispatch(canvas_id, &a.id, None),
    )
    .await;
    assert!(gave_up.is_err());
    assert_eq!(session.node(&a.id).await.unwrap().status, NodeStatus::Generating);

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(session.node(&a.id).await.unwrap().status, NodeStatus::Failed);
    assert!(!h.engine.reconciler().is_tracking(&a.id));

    h.backend.hang.store(false, Ordering::SeqCst);
    assert!(h.engine.dispatch(canvas_id, &b.id, None).await.is_ok());
}

// ---------------------------------------------------------------------------
// Edits while generating
// ---------------------------------------------------------------------------

/// Prompt, parameter and reference edits made while a job runs are stored
/// on the node and only reach the backend on the next dispatch.
#[tokio::test(start_paused = true)]
async fn edits_during_generation_apply_to_the_next_run() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session.create_node(NodeKind::Image, prompt("first")).await.unwrap();
    session
        .add_reference(&node.id, ReferenceAsset::new("https://cdn/a.png", ReferenceKind::Generic))
        .await
        .unwrap();

    h.engine.dispatch(canvas_id, &node.id, None).await.unwrap();

    session.update_prompt(&node.id, "second".into()).await.unwrap();
    session
        .update_parameters(
            &node.id,
            [("aspect_ratio".to_string(), ParamValue::from("16:9"))].into(),
        )
        .await
        .unwrap();
    session
        .add_reference(&node.id, ReferenceAsset::new("https://cdn/b.png", ReferenceKind::Generic))
        .await
        .unwrap();
    assert_eq!(session.node(&node.id).await.unwrap().status, NodeStatus::Generating);

    let submitted = h.backend.submitted();
    let first = &submitted[0];
    assert_eq!(first.prompt, "first");
    assert_eq!(first.parameters.get("aspect_ratio"), Some(&ParamValue::from("1:1")));
    assert_eq!(first.references, vec!["https://cdn/a.png".to_string()]);

    h.feed.push(JobUpdate::completed(node.id.clone(), "https://cdn/out.png"));
    settle().await;
    assert_eq!(session.node(&node.id).await.unwrap().status, NodeStatus::Completed);

    h.engine.dispatch(canvas_id, &node.id, None).await.unwrap();
    let submitted = h.backend.submitted();
    let second = &submitted[1];
    assert_eq!(second.prompt, "second");
    assert_eq!(second.parameters.get("aspect_ratio"), Some(&ParamValue::from("16:9")));
    assert_eq!(
        second.references,
        vec!["https://cdn/a.png".to_string(), "https://cdn/b.png".to_string()]
    );
}
