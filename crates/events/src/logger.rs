//! Structured log sink for canvas events.
//!
//! [`EventLogger`] subscribes to the bus and records every event through
//! `tracing`, giving one log line per node transition. It exits when the
//! bus is dropped.

use tokio::sync::broadcast;

use crate::bus::CanvasEvent;

/// Logs every canvas event at debug level.
pub struct EventLogger;

impl EventLogger {
    /// Consume events until the bus closes.
    pub async fn run(mut receiver: broadcast::Receiver<CanvasEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        canvas_id = %event.canvas_id,
                        node_id = event.node_id.as_deref().unwrap_or("-"),
                        "Canvas event",
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }
}
