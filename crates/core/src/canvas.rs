//! Node state machine.
//!
//! [`Canvas`] owns every generation node of one canvas and is the only code
//! that changes node status. It performs no I/O: the engine wraps it in a
//! lock, calls these transitions and does the networking around them.
//!
//! ```text
//!            start_generation
//!   Idle ───────────────────────► Generating ──► Completed
//!                                     │  ▲           │
//!                                     ▼  └───────────┘ (re-run)
//!                                   Failed
//! ```
//!
//! At most one node per canvas is `Generating`. The generating node is
//! derived from node statuses; there is no separate flag to drift.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{AiModel, ModelKind};
use crate::error::CoreError;
use crate::job::{JobStatus, JobUpdate, SubmitRequest};
use crate::node::{Geometry, GenerationNode, NewNode, NodeKind, NodeStatus, VideoMode, NODE_SPACING};
use crate::parameters::{merge_parameters, schema_defaults, ParamMap};
use crate::references::{ReferenceAsset, ReferenceSet};
use crate::snapshot::{CanvasSnapshot, SNAPSHOT_VERSION};
use crate::types::{new_node_id, CanvasId, NodeId};

// ---------------------------------------------------------------------------
// Transition inputs and outputs
// ---------------------------------------------------------------------------

/// Values a run is started with. Taken from the form on the UI path and
/// from the stored node on the agent path.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub parameters: ParamMap,
}

impl GenerationRequest {
    /// Request built from the node's stored values.
    pub fn from_node(node: &GenerationNode) -> Self {
        Self {
            prompt: node.prompt.clone(),
            model_id: node.model_id.clone(),
            parameters: node.parameters.clone(),
        }
    }
}

/// What [`Canvas::receive_result`] did with a job update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The node moved to the given terminal status.
    Applied(NodeStatus),
    /// The same terminal result was already applied.
    Duplicate,
    /// Non-terminal update, incomplete payload, or a node that never ran.
    Ignored,
    /// The node no longer exists.
    StaleNode,
}

/// Read-only projection of a node for the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub id: NodeId,
    /// `image` or `video`.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub prompt: String,
    /// Empty when no model is selected.
    pub model_id: String,
    pub status: NodeStatus,
    /// Whether a completed output is attached.
    pub has_result: bool,
    pub parameters: ParamMap,
    /// Top-left corner on the canvas.
    pub position: Position,
}

/// Canvas coordinates of a node's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// Node state of one canvas. Pure data; sessions add locking and events.
#[derive(Debug, Clone)]
pub struct Canvas {
    id: CanvasId,
    /// Insertion order is canvas order.
    nodes: IndexMap<NodeId, GenerationNode>,
    /// Subset of `nodes` the user has selected.
    selection: HashSet<NodeId>,
}

impl Canvas {
    /// Empty canvas.
    pub fn new(id: CanvasId) -> Self {
        Self {
            id,
            nodes: IndexMap::new(),
            selection: HashSet::new(),
        }
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    /// Node by id.
    pub fn node(&self, id: &str) -> Option<&GenerationNode> {
        self.nodes.get(id)
    }

    /// Nodes in canvas order.
    pub fn nodes(&self) -> impl Iterator<Item = &GenerationNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node currently generating, if any.
    pub fn generating_node(&self) -> Option<&GenerationNode> {
        self.nodes
            .values()
            .find(|n| n.status == NodeStatus::Generating)
    }

    /// Mutable node, or [`CoreError::StaleNodeReference`].
    fn node_mut(&mut self, id: &str) -> Result<&mut GenerationNode, CoreError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| CoreError::StaleNodeReference(id.to_string()))
    }

    // -- Creation and field edits --

    /// Insert a new `Idle` node. The node is fully formed before insertion.
    pub fn create(&mut self, kind: NodeKind, new: NewNode) -> GenerationNode {
        let (default_x, default_y) = self.next_free_position();
        let node = GenerationNode {
            id: new_node_id(),
            kind,
            prompt: new.prompt,
            model_id: new.model_id,
            parameters: new.parameters,
            references: ReferenceSet::new(),
            mode: match kind {
                NodeKind::Video => Some(new.mode.unwrap_or_default()),
                NodeKind::Image => None,
            },
            status: NodeStatus::Idle,
            result_url: None,
            geometry: Geometry {
                x: new.x.unwrap_or(default_x),
                y: new.y.unwrap_or(default_y),
                w: kind.width(),
                h: kind.initial_height(),
            },
        };
        self.nodes.insert(node.id.clone(), node.clone());
        node
    }

    /// Right of the rightmost node, on the top row.
    pub fn next_free_position(&self) -> (f64, f64) {
        let mut nodes = self.nodes.values().map(|n| &n.geometry);
        let Some(first) = nodes.next() else {
            return (0.0, 0.0);
        };
        let (right, top) = nodes.fold((first.x + first.w, first.y), |(right, top), g| {
            (right.max(g.x + g.w), top.min(g.y))
        });
        (right + NODE_SPACING, top)
    }

    /// Replace the prompt. Allowed in any status; a running job keeps the
    /// prompt it was submitted with.
    pub fn update_prompt(&mut self, id: &str, prompt: impl Into<String>) -> Result<(), CoreError> {
        self.node_mut(id)?.prompt = prompt.into();
        Ok(())
    }

    /// Select `model` for the node. Schema defaults are filled in only when
    /// the node has no parameters yet; existing choices are kept.
    pub fn select_model(&mut self, id: &str, model: &AiModel) -> Result<(), CoreError> {
        let node = self.node_mut(id)?;
        if ModelKind::from(node.kind) != model.kind {
            return Err(CoreError::Validation(format!(
                "Model '{}' is a {} model and cannot be used by a {} node",
                model.id,
                model.kind.as_str(),
                node.kind.as_str()
            )));
        }
        node.model_id = model.id.clone();
        if node.parameters.is_empty() {
            node.parameters = schema_defaults(&model.parameter_schema);
        }
        Ok(())
    }

    /// Merge `patch` into the node's parameters.
    pub fn update_parameters(&mut self, id: &str, patch: ParamMap) -> Result<(), CoreError> {
        merge_parameters(&mut self.node_mut(id)?.parameters, patch);
        Ok(())
    }

    /// Replace the node's references wholesale.
    pub fn update_references(
        &mut self,
        id: &str,
        references: Vec<ReferenceAsset>,
    ) -> Result<(), CoreError> {
        self.node_mut(id)?.references = ReferenceSet::from(references);
        Ok(())
    }

    /// See [`ReferenceSet::add`].
    pub fn add_reference(&mut self, id: &str, asset: ReferenceAsset) -> Result<(), CoreError> {
        self.node_mut(id)?.references.add(asset);
        Ok(())
    }

    /// Remove a reference by asset id.
    pub fn remove_reference(
        &mut self,
        id: &str,
        reference_id: &str,
    ) -> Result<Option<ReferenceAsset>, CoreError> {
        Ok(self.node_mut(id)?.references.remove(reference_id))
    }

    /// Switch a video node's reference mode. Image nodes have no mode.
    pub fn update_mode(&mut self, id: &str, mode: VideoMode) -> Result<(), CoreError> {
        let node = self.node_mut(id)?;
        if node.kind != NodeKind::Video {
            return Err(CoreError::Validation(
                "Only video nodes have a reference mode".to_string(),
            ));
        }
        node.mode = Some(mode);
        Ok(())
    }

    /// Move the node without touching its size.
    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> Result<(), CoreError> {
        let node = self.node_mut(id)?;
        node.geometry.x = x;
        node.geometry.y = y;
        Ok(())
    }

    // -- Lifecycle --

    /// Move the node to `Generating` and snapshot what will be submitted.
    pub fn start_generation(
        &mut self,
        id: &str,
        request: GenerationRequest,
    ) -> Result<SubmitRequest, CoreError> {
        if !self.nodes.contains_key(id) {
            return Err(CoreError::StaleNodeReference(id.to_string()));
        }
        if let Some(active) = self.generating_node() {
            return Err(CoreError::ConcurrencyViolation {
                requested: id.to_string(),
                active: active.id.clone(),
            });
        }
        if request.model_id.trim().is_empty() {
            return Err(CoreError::MissingPrerequisite(
                "no model selected".to_string(),
            ));
        }

        let node = self.node_mut(id)?;
        node.prompt = request.prompt;
        node.model_id = request.model_id;
        node.parameters = request.parameters;
        node.result_url = None;
        node.status = NodeStatus::Generating;

        Ok(SubmitRequest {
            node_id: node.id.clone(),
            prompt: node.prompt.clone(),
            model_id: node.model_id.clone(),
            kind: node.kind,
            parameters: node.parameters.clone(),
            references: node.submission_references(),
        })
    }

    /// Dispatch-time failure. Returns `false` when the node was not
    /// generating (already resolved by a result).
    pub fn mark_failed(&mut self, id: &str) -> Result<bool, CoreError> {
        let node = self.node_mut(id)?;
        if node.status != NodeStatus::Generating {
            return Ok(false);
        }
        node.status = NodeStatus::Failed;
        Ok(true)
    }

    /// Apply a backend job observation. Idempotent; safe to call from both
    /// the push and poll paths.
    pub fn receive_result(&mut self, update: &JobUpdate) -> ReceiveOutcome {
        let Some(node) = self.nodes.get_mut(&update.node_id) else {
            return ReceiveOutcome::StaleNode;
        };
        if node.status == NodeStatus::Idle {
            return ReceiveOutcome::Ignored;
        }

        match update.status {
            JobStatus::Completed => {
                let Some(url) = update.result_url.as_deref() else {
                    return ReceiveOutcome::Ignored;
                };
                if node.status == NodeStatus::Completed && node.result_url.as_deref() == Some(url) {
                    return ReceiveOutcome::Duplicate;
                }
                node.status = NodeStatus::Completed;
                node.result_url = Some(url.to_string());
                node.geometry.h = node.completed_height();
                ReceiveOutcome::Applied(NodeStatus::Completed)
            }
            JobStatus::Failed => {
                if node.status == NodeStatus::Failed {
                    return ReceiveOutcome::Duplicate;
                }
                node.status = NodeStatus::Failed;
                node.result_url = None;
                ReceiveOutcome::Applied(NodeStatus::Failed)
            }
            JobStatus::Pending | JobStatus::Processing => ReceiveOutcome::Ignored,
        }
    }

    /// Remove a node in any status. Backend work is not cancelled.
    pub fn delete(&mut self, id: &str) -> Option<GenerationNode> {
        self.selection.remove(id);
        self.nodes.shift_remove(id)
    }

    // -- Selection and analysis --

    /// Replace the selection. Unknown ids are dropped.
    pub fn set_selection<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.selection = ids
            .into_iter()
            .filter(|id| self.nodes.contains_key(id))
            .collect();
    }

    /// Agent-facing summaries. With `selected_only`, only selected nodes.
    pub fn analyze(&self, selected_only: bool) -> Vec<NodeSummary> {
        self.nodes
            .values()
            .filter(|n| !selected_only || self.selection.contains(&n.id))
            .map(|n| NodeSummary {
                id: n.id.clone(),
                kind: n.kind,
                prompt: n.prompt.clone(),
                model_id: n.model_id.clone(),
                status: n.status,
                has_result: n.result_url.is_some(),
                parameters: n.parameters.clone(),
                position: Position {
                    x: n.geometry.x,
                    y: n.geometry.y,
                },
            })
            .collect()
    }

    // -- Persistence --

    /// Serializable copy of the canvas at the current version.
    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            version: SNAPSHOT_VERSION,
            canvas_id: self.id,
            nodes: self.nodes.values().cloned().collect(),
            saved_at: chrono::Utc::now(),
        }
    }

    /// Rebuild a canvas from a snapshot, normalising every node. If the
    /// document holds more than one generating node, all but the first are
    /// marked failed.
    pub fn from_snapshot(snapshot: CanvasSnapshot) -> Result<Self, CoreError> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(CoreError::Validation(format!(
                "Unsupported snapshot version {} (max {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let mut canvas = Canvas::new(snapshot.canvas_id);
        let mut generating_seen = false;
        for mut node in snapshot.nodes {
            node.normalize();
            if node.status == NodeStatus::Generating {
                if generating_seen {
                    node.status = NodeStatus::Failed;
                }
                generating_seen = true;
            }
            canvas.nodes.insert(node.id.clone(), node);
        }
        Ok(canvas)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
