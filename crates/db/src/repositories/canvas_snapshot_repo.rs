//! Repository for the `canvas_snapshots` table.

use canvasgen_core::types::CanvasId;
use sqlx::PgPool;

use crate::models::canvas_snapshot::CanvasSnapshotRow;

/// Column list for `canvas_snapshots` queries.
const COLUMNS: &str = "canvas_id, snapshot, revision, created_at, updated_at";

/// Provides data access for canvas snapshots.
pub struct CanvasSnapshotRepo;

impl CanvasSnapshotRepo {
    /// Stored row for the canvas, if any.
    pub async fn find(
        pool: &PgPool,
        canvas_id: CanvasId,
    ) -> Result<Option<CanvasSnapshotRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM canvas_snapshots WHERE canvas_id = $1");
        sqlx::query_as::<_, CanvasSnapshotRow>(&query)
            .bind(canvas_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the document, bumping the revision. Returns the
    /// stored row.
    pub async fn upsert(
        pool: &PgPool,
        canvas_id: CanvasId,
        snapshot: &serde_json::Value,
    ) -> Result<CanvasSnapshotRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO canvas_snapshots (canvas_id, snapshot, revision) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (canvas_id) DO UPDATE \
                SET snapshot = EXCLUDED.snapshot, \
                    revision = canvas_snapshots.revision + 1, \
                    updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CanvasSnapshotRow>(&query)
            .bind(canvas_id)
            .bind(snapshot)
            .fetch_one(pool)
            .await
    }
}
