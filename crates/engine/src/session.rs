//! Canvas session: the single mutation entry point for one canvas.
//!
//! HTTP handlers and agent tools both call these methods. Every mutation
//! takes the canvas write lock, applies one state-machine transition,
//! publishes a [`CanvasEvent`] and bumps the revision counter watched by
//! autosave. No lock is held across network I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use canvasgen_core::canvas::{Canvas, GenerationRequest, NodeSummary, ReceiveOutcome};
use canvasgen_core::catalog::{AiModel, ModelCatalog};
use canvasgen_core::error::CoreError;
use canvasgen_core::event_types;
use canvasgen_core::job::{JobUpdate, SubmitRequest};
use canvasgen_core::node::{GenerationNode, NewNode, NodeKind, NodeStatus, VideoMode};
use canvasgen_core::parameters::ParamMap;
use canvasgen_core::references::ReferenceAsset;
use canvasgen_core::snapshot::CanvasSnapshot;
use canvasgen_core::types::{CanvasId, NodeId};
use canvasgen_events::{CanvasEvent, EventBus};
use tokio::sync::{Notify, RwLock};

use crate::reconcile::{ReconciliationChannel, ResultSink};

/// Shared handle to one open canvas.
pub struct CanvasSession {
    id: CanvasId,
    canvas: RwLock<Canvas>,
    catalog: Arc<ModelCatalog>,
    events: Arc<EventBus>,
    reconciler: Arc<ReconciliationChannel>,
    revision: AtomicU64,
    changed: Notify,
}

impl CanvasSession {
    /// Session over a loaded canvas. Autosave is started by the registry.
    pub fn new(
        canvas: Canvas,
        catalog: Arc<ModelCatalog>,
        events: Arc<EventBus>,
        reconciler: Arc<ReconciliationChannel>,
    ) -> Self {
        Self {
            id: canvas.id(),
            canvas: RwLock::new(canvas),
            catalog,
            events,
            reconciler,
            revision: AtomicU64::new(0),
            changed: Notify::new(),
        }
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Monotonic change counter.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Resolves after the next change. A change made while nobody waits is
    /// remembered for the next call.
    pub async fn changed(&self) {
        self.changed.notified().await
    }

    fn touch(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_one();
    }

    fn publish(&self, event_type: &str, node: &GenerationNode) {
        let payload = serde_json::to_value(node).unwrap_or_default();
        self.events.publish(
            CanvasEvent::new(event_type, self.id)
                .with_node(node.id.clone())
                .with_payload(payload),
        );
    }

    pub(crate) fn publish_saved(&self, revision: u64) {
        self.events.publish(
            CanvasEvent::new(event_types::CANVAS_SAVED, self.id)
                .with_payload(serde_json::json!({ "revision": revision })),
        );
    }

    /// Run `edit` on one node under the write lock, then publish the node.
    async fn edit_node<T>(
        &self,
        node_id: &str,
        edit: impl FnOnce(&mut Canvas) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut canvas = self.canvas.write().await;
        let out = edit(&mut canvas)?;
        if let Some(node) = canvas.node(node_id) {
            self.publish(event_types::NODE_UPDATED, node);
        }
        drop(canvas);
        self.touch();
        Ok(out)
    }

    fn model_for(&self, kind: NodeKind, model_id: &str) -> Result<&AiModel, CoreError> {
        self.catalog.find_for(kind, model_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "Model '{model_id}' is not available for {} nodes",
                kind.as_str()
            ))
        })
    }

    // -- Queries --

    /// Copy of one node.
    pub async fn node(&self, node_id: &str) -> Option<GenerationNode> {
        self.canvas.read().await.node(node_id).cloned()
    }

    /// Copies of all nodes, in canvas order.
    pub async fn nodes(&self) -> Vec<GenerationNode> {
        self.canvas.read().await.nodes().cloned().collect()
    }

    /// The node currently generating, if any.
    pub async fn generating_node(&self) -> Option<NodeId> {
        self.canvas
            .read()
            .await
            .generating_node()
            .map(|n| n.id.clone())
    }

    /// See [`Canvas::analyze`].
    pub async fn analyze(&self, selected_only: bool) -> Vec<NodeSummary> {
        self.canvas.read().await.analyze(selected_only)
    }

    /// Snapshot for persistence or a joining viewer.
    pub async fn snapshot(&self) -> CanvasSnapshot {
        self.canvas.read().await.snapshot()
    }

    // -- Mutations --

    /// Create a node. The model (given or the kind's default) is selected
    /// before `new.parameters` are merged on top of its schema defaults,
    /// all under one lock.
    pub async fn create_node(
        &self,
        kind: NodeKind,
        mut new: NewNode,
    ) -> Result<GenerationNode, CoreError> {
        let model = if new.model_id.is_empty() {
            self.catalog.default_for(kind)
        } else {
            Some(self.model_for(kind, &new.model_id)?)
        };
        let overrides = std::mem::take(&mut new.parameters);
        new.model_id.clear();

        let mut canvas = self.canvas.write().await;
        let id = canvas.create(kind, new).id;
        if let Some(model) = model {
            canvas.select_model(&id, model)?;
        }
        canvas.update_parameters(&id, overrides)?;
        let node = canvas
            .node(&id)
            .cloned()
            .ok_or_else(|| CoreError::Internal(format!("node {id} vanished during creation")))?;
        drop(canvas);

        tracing::info!(canvas_id = %self.id, node_id = %node.id, kind = kind.as_str(), "Node created");
        self.publish(event_types::NODE_CREATED, &node);
        self.touch();
        Ok(node)
    }

    /// Edits are allowed while a node generates; they apply to the next run.
    pub async fn update_prompt(&self, node_id: &str, prompt: String) -> Result<(), CoreError> {
        self.edit_node(node_id, |c| c.update_prompt(node_id, prompt))
            .await
    }

    /// Select a catalog model by id, checked against the node's kind.
    pub async fn select_model(&self, node_id: &str, model_id: &str) -> Result<(), CoreError> {
        let kind = self
            .canvas
            .read()
            .await
            .node(node_id)
            .map(|n| n.kind)
            .ok_or_else(|| CoreError::StaleNodeReference(node_id.to_string()))?;
        let model = self.model_for(kind, model_id)?;
        self.edit_node(node_id, |c| c.select_model(node_id, model))
            .await
    }

    /// Merge `patch` into the node's parameters.
    pub async fn update_parameters(&self, node_id: &str, patch: ParamMap) -> Result<(), CoreError> {
        self.edit_node(node_id, |c| c.update_parameters(node_id, patch))
            .await
    }

    /// Replace the references wholesale.
    pub async fn update_references(
        &self,
        node_id: &str,
        references: Vec<ReferenceAsset>,
    ) -> Result<(), CoreError> {
        self.edit_node(node_id, |c| c.update_references(node_id, references))
            .await
    }

    /// Attach an asset. A frame replaces the existing frame of its kind.
    pub async fn add_reference(&self, node_id: &str, asset: ReferenceAsset) -> Result<(), CoreError> {
        self.edit_node(node_id, |c| c.add_reference(node_id, asset))
            .await
    }

    /// Remove a reference by asset id.
    pub async fn remove_reference(
        &self,
        node_id: &str,
        reference_id: &str,
    ) -> Result<Option<ReferenceAsset>, CoreError> {
        self.edit_node(node_id, |c| c.remove_reference(node_id, reference_id))
            .await
    }

    /// Switch a video node between frame and multi-reference input.
    pub async fn update_mode(&self, node_id: &str, mode: VideoMode) -> Result<(), CoreError> {
        self.edit_node(node_id, |c| c.update_mode(node_id, mode))
            .await
    }

    /// Move the node. Size is untouched.
    pub async fn move_node(&self, node_id: &str, x: f64, y: f64) -> Result<(), CoreError> {
        self.edit_node(node_id, |c| c.move_node(node_id, x, y))
            .await
    }

    /// Replace the selection. Unknown ids are dropped.
    pub async fn set_selection(&self, ids: Vec<NodeId>) {
        self.canvas.write().await.set_selection(ids);
    }

    /// Delete a node in any status. Tracking is released; backend work is
    /// left to finish on its own.
    pub async fn delete_node(&self, node_id: &str) -> Result<GenerationNode, CoreError> {
        let removed = self
            .canvas
            .write()
            .await
            .delete(node_id)
            .ok_or_else(|| CoreError::StaleNodeReference(node_id.to_string()))?;

        if removed.status == NodeStatus::Generating {
            tracing::info!(canvas_id = %self.id, node_id, "Deleted generating node, abandoning its job");
        }
        self.reconciler.untrack(node_id);
        self.publish(event_types::NODE_DELETED, &removed);
        self.touch();
        Ok(removed)
    }

    // -- Lifecycle (driven by the dispatcher and the reconciler) --

    /// Move the node to `Generating` and return what to submit.
    pub(crate) async fn start_generation(
        &self,
        node_id: &str,
        request: GenerationRequest,
    ) -> Result<SubmitRequest, CoreError> {
        let mut canvas = self.canvas.write().await;
        let submit = canvas.start_generation(node_id, request)?;
        if let Some(node) = canvas.node(node_id) {
            self.publish(event_types::GENERATION_STARTED, node);
        }
        drop(canvas);
        self.touch();
        Ok(submit)
    }

    /// Fail a node whose submission did not go through.
    pub(crate) async fn mark_failed(&self, node_id: &str) {
        let mut canvas = self.canvas.write().await;
        match canvas.mark_failed(node_id) {
            Ok(true) => {
                if let Some(node) = canvas.node(node_id) {
                    self.publish(event_types::GENERATION_FAILED, node);
                }
                drop(canvas);
                self.touch();
            }
            Ok(false) => {}
            Err(_) => {
                tracing::debug!(canvas_id = %self.id, node_id, "Node deleted before dispatch failed");
            }
        }
    }
}

#[async_trait]
impl ResultSink for CanvasSession {
    async fn receive_result(&self, update: &JobUpdate) -> ReceiveOutcome {
        let mut canvas = self.canvas.write().await;
        let outcome = canvas.receive_result(update);

        if let ReceiveOutcome::Applied(status) = outcome {
            let event_type = match status {
                NodeStatus::Completed => event_types::GENERATION_COMPLETED,
                _ => event_types::GENERATION_FAILED,
            };
            if let Some(node) = canvas.node(&update.node_id) {
                self.publish(event_type, node);
            }
            drop(canvas);
            self.touch();
            tracing::info!(
                canvas_id = %self.id,
                node_id = %update.node_id,
                status = ?status,
                "Generation result applied",
            );
        }
        outcome
    }

    async fn is_generating(&self, node_id: &str) -> Option<bool> {
        self.canvas
            .read()
            .await
            .node(node_id)
            .map(|n| n.status == NodeStatus::Generating)
    }
}
