//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans out [`CanvasEvent`]s to every subscriber: the WebSocket
//! forwarder, the event logger and any test harness. It is shared via
//! `Arc<EventBus>`.

use canvasgen_core::types::{CanvasId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// CanvasEvent
// ---------------------------------------------------------------------------

/// Something that happened on a canvas.
///
/// Constructed via [`CanvasEvent::new`] and enriched with
/// [`with_node`](CanvasEvent::with_node) and
/// [`with_payload`](CanvasEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasEvent {
    /// Dot-separated event name, e.g. `"generation.completed"`.
    pub event_type: String,

    /// Canvas the event belongs to; viewers are routed by it.
    pub canvas_id: CanvasId,

    /// Node the event concerns, when there is one.
    pub node_id: Option<NodeId>,

    /// Event-specific data, usually the node after the change.
    pub payload: serde_json::Value,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl CanvasEvent {
    /// Event with an empty payload and no node.
    pub fn new(event_type: impl Into<String>, canvas_id: CanvasId) -> Self {
        Self {
            event_type: event_type.into(),
            canvas_id,
            node_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the node the event is about.
    pub fn with_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Attach the event body.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use canvasgen_events::bus::{CanvasEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(CanvasEvent::new("node.created", uuid::Uuid::nil()));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<CanvasEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer wraps.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped when nobody listens.
    pub fn publish(&self, event: CanvasEvent) {
        let _ = self.sender.send(event);
    }

    /// New receiver seeing events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CanvasEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
