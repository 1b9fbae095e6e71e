//! Canvas WebSocket endpoint. A viewer gets the snapshot first, then every
//! event published for that canvas.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use canvasgen_core::event_types;
use canvasgen_core::types::CanvasId;
use canvasgen_engine::{CanvasSession, SessionLease};
use canvasgen_events::CanvasEvent;
use futures::{SinkExt, StreamExt};

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// GET /api/v1/canvases/{id}/ws
///
/// Upgrades to a WebSocket that first receives the canvas snapshot and then
/// every event published for that canvas.
pub async fn canvas_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
) -> AppResult<impl IntoResponse> {
    let (session, lease) = state.engine.watch(canvas_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, lease, state.ws_manager)))
}

/// Joining happens before the snapshot is taken, so an event published in
/// between reaches the browser after the snapshot instead of being lost.
/// The lease keeps the canvas open until the viewer disconnects.
async fn handle_socket(
    socket: WebSocket,
    session: Arc<CanvasSession>,
    _lease: SessionLease,
    ws_manager: Arc<WsManager>,
) {
    let canvas_id = session.id();
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(%conn_id, %canvas_id, "Viewer connected");

    let mut rx = ws_manager.join(canvas_id, conn_id).await;
    let (mut sink, mut stream) = socket.split();

    let snapshot = CanvasEvent::new(event_types::CANVAS_SNAPSHOT, canvas_id)
        .with_payload(serde_json::to_value(session.snapshot().await).unwrap_or_default());
    drop(session);
    if let Ok(text) = serde_json::to_string(&snapshot) {
        if sink.send(Message::Text(text.into())).await.is_err() {
            ws_manager.leave(canvas_id, conn_id).await;
            return;
        }
    }

    let mut outbound = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    // Browsers only listen; inbound frames matter for liveness alone.
    loop {
        tokio::select! {
            _ = &mut outbound => break,
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%conn_id, error = %e, "Viewer socket error");
                    break;
                }
            },
        }
    }

    ws_manager.leave(canvas_id, conn_id).await;
    outbound.abort();
    tracing::info!(%conn_id, %canvas_id, "Viewer disconnected");
}
