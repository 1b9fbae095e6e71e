use serde::{Deserialize, Serialize};

use crate::node::GenerationNode;
use crate::types::{CanvasId, Timestamp};

/// Current snapshot document version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of a canvas: its nodes in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    /// Document format version. Missing in the oldest documents.
    #[serde(default = "default_version")]
    pub version: u32,
    pub canvas_id: CanvasId,
    /// Nodes in canvas order.
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub nodes: Vec<GenerationNode>,
    /// When the snapshot was taken, not when it was written.
    pub saved_at: Timestamp,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl CanvasSnapshot {
    /// Snapshot of a canvas with no nodes.
    pub fn empty(canvas_id: CanvasId) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            canvas_id,
            nodes: Vec::new(),
            saved_at: chrono::Utc::now(),
        }
    }
}
