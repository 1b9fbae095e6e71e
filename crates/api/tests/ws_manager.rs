//! Canvas-scoped WebSocket fan-out.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::ws::Message;
use canvasgen_api::ws::{spawn_heartbeat, EventForwarder, WsManager};
use canvasgen_events::{CanvasEvent, EventBus};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn broadcast_only_reaches_viewers_of_that_canvas() {
    let manager = WsManager::new();
    let canvas_a = Uuid::new_v4();
    let canvas_b = Uuid::new_v4();
    let viewer_a = Uuid::new_v4();
    let mut rx_a = manager.join(canvas_a, viewer_a).await;
    let mut rx_b = manager.join(canvas_b, Uuid::new_v4()).await;

    let sent = manager.broadcast(canvas_a, Message::Text("hello".into())).await;
    assert_eq!(sent, 1);
    assert_matches!(rx_a.try_recv(), Ok(Message::Text(_)));
    assert!(rx_b.try_recv().is_err());

    manager.leave(canvas_a, viewer_a).await;
    assert_eq!(manager.viewer_count(canvas_a).await, 0);
    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(manager.broadcast(canvas_a, Message::Text("gone".into())).await, 0);
}

#[tokio::test]
async fn dropped_receiver_is_not_counted() {
    let manager = WsManager::new();
    let canvas = Uuid::new_v4();
    let _live = manager.join(canvas, Uuid::new_v4()).await;
    drop(manager.join(canvas, Uuid::new_v4()).await);

    assert_eq!(manager.viewer_count(canvas).await, 2);
    assert_eq!(manager.broadcast(canvas, Message::Text("x".into())).await, 1);
}

#[tokio::test]
async fn close_all_sends_close_frames() {
    let manager = WsManager::new();
    let mut rx = manager.join(Uuid::new_v4(), Uuid::new_v4()).await;
    manager.close_all().await;
    assert_matches!(rx.recv().await, Some(Message::Close(None)));
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_until_cancelled() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.join(Uuid::new_v4(), Uuid::new_v4()).await;
    let cancel = CancellationToken::new();
    let handle = spawn_heartbeat(Arc::clone(&manager), Duration::from_secs(30), cancel.clone());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_matches!(rx.recv().await, Some(Message::Ping(_)));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn forwarder_delivers_bus_events_as_json() {
    let manager = Arc::new(WsManager::new());
    let bus = EventBus::default();
    let canvas_id = Uuid::new_v4();
    let mut rx = manager.join(canvas_id, Uuid::new_v4()).await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        EventForwarder::new(Arc::clone(&manager)).run(bus.subscribe(), cancel.clone()),
    );

    bus.publish(CanvasEvent::new("generation.completed", canvas_id).with_node("node:1"));
    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let Message::Text(text) = message else {
        panic!("expected a text frame");
    };
    let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(json["event_type"], "generation.completed");
    assert_eq!(json["node_id"], "node:1");

    cancel.cancel();
    handle.await.unwrap();
}
