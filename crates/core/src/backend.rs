//! Collaborator traits implemented by the adapter crates.
//!
//! The engine depends only on these; `canvasgen-provider` and
//! `canvasgen-db` supply the production implementations and tests supply
//! in-memory fakes.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::job::{JobUpdate, SubmitAck, SubmitRequest};
use crate::snapshot::CanvasSnapshot;
use crate::types::CanvasId;

/// Submits generation jobs and reports their status.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit one job. An accepted job reports back through the feed or
    /// the status endpoint.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, CoreError>;

    /// Latest status of the job for `node_id`, or `None` if the backend has
    /// no job for it.
    async fn job_status(&self, node_id: &str) -> Result<Option<JobUpdate>, CoreError>;
}

/// Realtime job updates pushed by the backend.
#[async_trait]
pub trait JobFeed: Send + Sync {
    /// Receive every update delivered by the feed.
    fn subscribe(&self) -> broadcast::Receiver<JobUpdate>;

    /// Register interest in `node_id`. Interest survives reconnects.
    async fn watch(&self, node_id: &str);

    /// Stop pushing updates for `node_id`.
    async fn unwatch(&self, node_id: &str);
}

/// Read-only view of the user's credit balance.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Credits currently available.
    async fn balance(&self) -> Result<u32, CoreError>;
}

/// Durable storage for canvas snapshots.
#[async_trait]
pub trait CanvasStore: Send + Sync {
    /// Stored snapshot, or `None` for a canvas never saved.
    async fn load(&self, canvas_id: CanvasId) -> Result<Option<CanvasSnapshot>, CoreError>;

    /// Replace the stored snapshot.
    async fn save(&self, canvas_id: CanvasId, snapshot: &CanvasSnapshot) -> Result<(), CoreError>;
}
