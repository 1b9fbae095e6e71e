//! Fans canvas events out to the browsers watching each canvas.

use std::sync::Arc;

use axum::extract::ws::Message;
use canvasgen_events::CanvasEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Pushes canvas events to the viewers of that canvas.
pub struct EventForwarder {
    ws_manager: Arc<WsManager>,
}

impl EventForwarder {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Forward events until cancelled or the bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<CanvasEvent>, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = receiver.recv() => received,
            };
            match received {
                Ok(event) => self.forward(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event forwarder lagged, browsers may miss updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!("Event forwarder stopped");
    }

    async fn forward(&self, event: &CanvasEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(event_type = %event.event_type, error = %e, "Failed to serialize canvas event");
                return;
            }
        };
        let sent = self
            .ws_manager
            .broadcast(event.canvas_id, Message::Text(text.into()))
            .await;
        tracing::trace!(event_type = %event.event_type, canvas_id = %event.canvas_id, sent, "Canvas event forwarded");
    }
}
