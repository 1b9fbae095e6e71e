//! Session registry: shared loads, leases and idle eviction.

mod common;

use std::sync::Arc;
use std::time::Duration;

use canvasgen_core::node::{NewNode, NodeKind};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{harness, settle};

const PAST_IDLE: Duration = Duration::from_secs(601);

/// Two first accesses racing on one canvas load it once.
#[tokio::test(start_paused = true)]
async fn concurrent_opens_share_one_session() {
    let h = harness();
    let canvas_id = Uuid::new_v4();

    let (a, b) = tokio::join!(h.engine.session(canvas_id), h.engine.session(canvas_id));
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(h.engine.sessions().open_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn unused_sessions_are_evicted() {
    let h = harness();
    for _ in 0..50 {
        h.engine.session(Uuid::new_v4()).await.unwrap();
    }
    assert_eq!(h.engine.sessions().open_count().await, 50);

    tokio::time::sleep(PAST_IDLE).await;
    assert_eq!(h.engine.sessions().evict_idle().await, 50);
    assert_eq!(h.engine.sessions().open_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn access_resets_the_idle_clock() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    h.engine.session(canvas_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(500)).await;
    h.engine.session(canvas_id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(200)).await;

    assert_eq!(h.engine.sessions().evict_idle().await, 0);
}

/// A lease pins the session; the idle clock starts when it is dropped.
#[tokio::test(start_paused = true)]
async fn watched_session_outlives_the_idle_period() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let (_session, lease) = h.engine.watch(canvas_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.engine.sessions().evict_idle().await, 0);

    drop(lease);
    assert_eq!(h.engine.sessions().evict_idle().await, 0);
    tokio::time::sleep(PAST_IDLE).await;
    assert_eq!(h.engine.sessions().evict_idle().await, 1);
}

/// Closing a session mid-generation would drop the live result, so the
/// sweep leaves it open.
#[tokio::test(start_paused = true)]
async fn session_with_running_generation_is_kept() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    let node = session
        .create_node(NodeKind::Image, NewNode::default())
        .await
        .unwrap();
    h.engine.dispatch(canvas_id, &node.id, None).await.unwrap();
    drop(session);

    tokio::time::sleep(PAST_IDLE).await;
    assert_eq!(h.engine.sessions().evict_idle().await, 0);
    assert!(h.engine.reconciler().is_tracking(&node.id));
}

/// The periodic sweep closes an idle canvas after a final save.
#[tokio::test(start_paused = true)]
async fn eviction_sweep_closes_and_saves_idle_canvases() {
    let h = harness();
    let canvas_id = Uuid::new_v4();
    let session = h.engine.session(canvas_id).await.unwrap();
    session
        .create_node(NodeKind::Video, NewNode::default())
        .await
        .unwrap();
    drop(session);
    settle().await;

    let sweep = tokio::time::timeout(
        Duration::from_secs(3600),
        h.engine.run_idle_eviction(CancellationToken::new()),
    )
    .await;
    assert!(sweep.is_err());
    assert_eq!(h.engine.sessions().open_count().await, 0);

    // Reopening reads the saved document back.
    let reopened = h.engine.session(canvas_id).await.unwrap();
    assert_eq!(reopened.nodes().await.len(), 1);
}
