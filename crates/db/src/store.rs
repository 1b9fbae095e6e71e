//! [`CanvasStore`] backed by the `canvas_snapshots` table.

use async_trait::async_trait;
use canvasgen_core::backend::CanvasStore;
use canvasgen_core::error::CoreError;
use canvasgen_core::snapshot::CanvasSnapshot;
use canvasgen_core::types::CanvasId;

use crate::repositories::CanvasSnapshotRepo;
use crate::DbPool;

/// [`CanvasStore`] over the `canvas_snapshots` table.
#[derive(Clone)]
pub struct PgCanvasStore {
    pool: DbPool,
}

impl PgCanvasStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Database errors reach the engine as storage failures.
fn storage_error(err: sqlx::Error) -> CoreError {
    CoreError::Storage(err.to_string())
}

#[async_trait]
impl CanvasStore for PgCanvasStore {
    async fn load(&self, canvas_id: CanvasId) -> Result<Option<CanvasSnapshot>, CoreError> {
        let Some(row) = CanvasSnapshotRepo::find(&self.pool, canvas_id)
            .await
            .map_err(storage_error)?
        else {
            return Ok(None);
        };

        let snapshot = serde_json::from_value(row.snapshot).map_err(|e| {
            CoreError::Storage(format!("Corrupt snapshot for canvas {canvas_id}: {e}"))
        })?;
        Ok(Some(snapshot))
    }

    async fn save(&self, canvas_id: CanvasId, snapshot: &CanvasSnapshot) -> Result<(), CoreError> {
        let document =
            serde_json::to_value(snapshot).map_err(|e| CoreError::Internal(e.to_string()))?;
        let row = CanvasSnapshotRepo::upsert(&self.pool, canvas_id, &document)
            .await
            .map_err(storage_error)?;
        tracing::debug!(%canvas_id, revision = row.revision, "Canvas snapshot saved");
        Ok(())
    }
}
