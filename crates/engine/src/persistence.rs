//! In-memory [`CanvasStore`] for tests and database-less runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use canvasgen_core::backend::CanvasStore;
use canvasgen_core::error::CoreError;
use canvasgen_core::snapshot::CanvasSnapshot;
use canvasgen_core::types::CanvasId;
use tokio::sync::RwLock;

/// Process-local [`CanvasStore`]. Used when no database is configured.
#[derive(Default)]
pub struct MemoryCanvasStore {
    snapshots: RwLock<HashMap<CanvasId, CanvasSnapshot>>,
    saves: AtomicUsize,
}

impl MemoryCanvasStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Stored snapshot, if any.
    pub async fn get(&self, canvas_id: CanvasId) -> Option<CanvasSnapshot> {
        self.snapshots.read().await.get(&canvas_id).cloned()
    }
}

#[async_trait]
impl CanvasStore for MemoryCanvasStore {
    async fn load(&self, canvas_id: CanvasId) -> Result<Option<CanvasSnapshot>, CoreError> {
        Ok(self.get(canvas_id).await)
    }

    async fn save(&self, canvas_id: CanvasId, snapshot: &CanvasSnapshot) -> Result<(), CoreError> {
        self.snapshots
            .write()
            .await
            .insert(canvas_id, snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
