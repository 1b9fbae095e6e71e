//! Canvas snapshot row model.

use canvasgen_core::types::{CanvasId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `canvas_snapshots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CanvasSnapshotRow {
    /// Primary key.
    pub canvas_id: CanvasId,
    /// The serialized `CanvasSnapshot` document.
    pub snapshot: serde_json::Value,
    /// Incremented on every save.
    pub revision: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
