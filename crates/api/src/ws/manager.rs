//! Browser connections, grouped by the canvas each one watches.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use canvasgen_core::types::{CanvasId, Timestamp};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Outbound queue of one connection, drained by its socket task.
pub type ViewerTx = mpsc::UnboundedSender<Message>;

/// One connected browser tab.
struct Viewer {
    tx: ViewerTx,
    joined_at: Timestamp,
}

type ViewerGroups = HashMap<CanvasId, HashMap<Uuid, Viewer>>;

/// Live WebSocket viewers, grouped by the canvas they watch.
#[derive(Default)]
pub struct WsManager {
    canvases: RwLock<ViewerGroups>,
}

impl WsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a viewer of `canvas_id` and return the queue its socket task
    /// should drain.
    pub async fn join(&self, canvas_id: CanvasId, conn_id: Uuid) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let viewer = Viewer {
            tx,
            joined_at: chrono::Utc::now(),
        };
        self.canvases
            .write()
            .await
            .entry(canvas_id)
            .or_default()
            .insert(conn_id, viewer);
        rx
    }

    /// Remove a viewer. The canvas group goes away with its last viewer.
    pub async fn leave(&self, canvas_id: CanvasId, conn_id: Uuid) {
        let mut canvases = self.canvases.write().await;
        let Some(group) = canvases.get_mut(&canvas_id) else {
            return;
        };
        if let Some(viewer) = group.remove(&conn_id) {
            let watched_secs = (chrono::Utc::now() - viewer.joined_at).num_seconds();
            tracing::debug!(%canvas_id, %conn_id, watched_secs, "Viewer left");
        }
        if group.is_empty() {
            canvases.remove(&canvas_id);
        }
    }

    /// Queue `message` for every viewer of `canvas_id`; returns how many
    /// accepted it. Viewers whose socket already ended are skipped.
    pub async fn broadcast(&self, canvas_id: CanvasId, message: Message) -> usize {
        let canvases = self.canvases.read().await;
        canvases.get(&canvas_id).map_or(0, |group| {
            group
                .values()
                .filter(|viewer| viewer.tx.send(message.clone()).is_ok())
                .count()
        })
    }

    /// Viewers currently attached to `canvas_id`.
    pub async fn viewer_count(&self, canvas_id: CanvasId) -> usize {
        self.canvases
            .read()
            .await
            .get(&canvas_id)
            .map_or(0, HashMap::len)
    }

    /// Viewers across all canvases.
    pub async fn connection_count(&self) -> usize {
        self.canvases.read().await.values().map(HashMap::len).sum()
    }

    /// Send a ping to every viewer. Used by the heartbeat.
    pub async fn ping_all(&self) {
        let canvases = self.canvases.read().await;
        for viewer in canvases.values().flat_map(HashMap::values) {
            let _ = viewer.tx.send(Message::Ping(Bytes::new()));
        }
    }

    /// Ask every socket to close and forget all viewers.
    pub async fn close_all(&self) {
        let mut canvases = self.canvases.write().await;
        let count: usize = canvases.values().map(HashMap::len).sum();
        for viewer in canvases.values().flat_map(HashMap::values) {
            let _ = viewer.tx.send(Message::Close(None));
        }
        canvases.clear();
        tracing::info!(count, "Closed all canvas viewers");
    }
}
