//! Handlers for canvases and their generation nodes.
//!
//! Every mutation goes through the canvas session, which publishes the
//! change to browsers and schedules an autosave.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use canvasgen_core::node::{NewNode, NodeKind, VideoMode};
use canvasgen_core::parameters::{params_from_json, validate_values};
use canvasgen_core::references::{ReferenceAsset, ReferenceKind};
use canvasgen_core::types::{CanvasId, NodeId};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /canvases/{id}/nodes`.
#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub prompt: String,
    /// Defaults to the first active model of the kind.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Initial values, validated against the model's schema.
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Video nodes only.
    #[serde(default)]
    pub mode: Option<VideoMode>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// Partial node update. Absent fields are left unchanged; `parameters`
/// are merged into the current ones.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateNodeRequest {
    pub prompt: Option<String>,
    /// Must name a catalog model of the node's kind.
    pub model_id: Option<String>,
    pub parameters: Option<Value>,
    /// Rejected on image nodes.
    pub mode: Option<VideoMode>,
    /// New position; either coordinate may be given alone.
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Body of `POST /canvases/{id}/nodes/{node_id}/references`.
#[derive(Debug, Deserialize)]
pub struct AddReferenceRequest {
    /// Location of the uploaded asset.
    pub url: String,
    /// Defaults to a generic reference.
    #[serde(rename = "type", default = "generic_reference")]
    pub kind: ReferenceKind,
}

/// Serde default for [`AddReferenceRequest::kind`].
fn generic_reference() -> ReferenceKind {
    ReferenceKind::Generic
}

/// Body of `PUT /canvases/{id}/selection`.
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub node_ids: Vec<NodeId>,
}

/// Parameters from a request body; `null` and absent both mean "leave as is".
fn parse_parameters(value: Option<&Value>) -> AppResult<Option<canvasgen_core::parameters::ParamMap>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(params_from_json(value)?)),
    }
}

// ---------------------------------------------------------------------------
// Canvas endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/canvases/{id}
///
/// Current snapshot of the canvas, opening it on first access.
pub async fn get_canvas(
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    Ok(Json(DataResponse {
        data: session.snapshot().await,
    }))
}

/// POST /api/v1/canvases/{id}/close
///
/// Flush unsaved changes and release the session.
pub async fn close_canvas(
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
) -> AppResult<impl IntoResponse> {
    let closed = state.engine.sessions().close(canvas_id).await;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "closed": closed }),
    }))
}

/// PUT /api/v1/canvases/{id}/selection
pub async fn set_selection(
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
    Json(input): Json<SelectionRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    session.set_selection(input.node_ids).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Node endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/canvases/{id}/nodes
pub async fn list_nodes(
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    Ok(Json(DataResponse {
        data: session.nodes().await,
    }))
}

/// POST /api/v1/canvases/{id}/nodes
///
/// Create a node. Without `model_id` the first active model of the node's
/// kind is selected and its schema defaults are applied.
pub async fn create_node(
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
    Json(input): Json<CreateNodeRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    let parameters = parse_parameters(input.parameters.as_ref())?.unwrap_or_default();

    let model_id = input.model_id.unwrap_or_default();
    let model = if model_id.is_empty() {
        session.catalog().default_for(input.kind)
    } else {
        session.catalog().find_for(input.kind, &model_id)
    };
    if let Some(model) = model {
        validate_values(&model.parameter_schema, &parameters)?;
    }

    let node = session
        .create_node(
            input.kind,
            NewNode {
                prompt: input.prompt,
                model_id,
                parameters,
                mode: input.mode,
                x: input.x,
                y: input.y,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: node })))
}

/// GET /api/v1/canvases/{id}/nodes/{node_id}
pub async fn get_node(
    State(state): State<AppState>,
    Path((canvas_id, node_id)): Path<(CanvasId, NodeId)>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    let node = session
        .node(&node_id)
        .await
        .ok_or(canvasgen_core::error::CoreError::StaleNodeReference(node_id))?;
    Ok(Json(DataResponse { data: node }))
}

/// PATCH /api/v1/canvases/{id}/nodes/{node_id}
///
/// The whole request is validated before any field is changed.
pub async fn update_node(
    State(state): State<AppState>,
    Path((canvas_id, node_id)): Path<(CanvasId, NodeId)>,
    Json(input): Json<UpdateNodeRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    let node = session
        .node(&node_id)
        .await
        .ok_or_else(|| canvasgen_core::error::CoreError::StaleNodeReference(node_id.clone()))?;

    let model_id = input.model_id.as_deref().unwrap_or(&node.model_id);
    let parameters = parse_parameters(input.parameters.as_ref())?;
    if let (Some(params), Some(model)) = (&parameters, session.catalog().find_for(node.kind, model_id)) {
        validate_values(&model.parameter_schema, params)?;
    }
    if input.mode.is_some() && node.kind == NodeKind::Image {
        return Err(AppError::BadRequest("Image nodes have no mode".into()));
    }

    if let Some(prompt) = input.prompt {
        session.update_prompt(&node_id, prompt).await?;
    }
    if let Some(model_id) = &input.model_id {
        session.select_model(&node_id, model_id).await?;
    }
    if let Some(parameters) = parameters {
        session.update_parameters(&node_id, parameters).await?;
    }
    if let Some(mode) = input.mode {
        session.update_mode(&node_id, mode).await?;
    }
    if input.x.is_some() || input.y.is_some() {
        let x = input.x.unwrap_or(node.geometry.x);
        let y = input.y.unwrap_or(node.geometry.y);
        session.move_node(&node_id, x, y).await?;
    }

    let updated = session
        .node(&node_id)
        .await
        .ok_or(canvasgen_core::error::CoreError::StaleNodeReference(node_id))?;
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/canvases/{id}/nodes/{node_id}
///
/// Deleting a generating node abandons its job; the backend is not told.
pub async fn delete_node(
    State(state): State<AppState>,
    Path((canvas_id, node_id)): Path<(CanvasId, NodeId)>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    session.delete_node(&node_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Reference endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/canvases/{id}/nodes/{node_id}/references
///
/// A start or end frame replaces the node's existing frame of that kind.
pub async fn add_reference(
    State(state): State<AppState>,
    Path((canvas_id, node_id)): Path<(CanvasId, NodeId)>,
    Json(input): Json<AddReferenceRequest>,
) -> AppResult<impl IntoResponse> {
    if input.url.trim().is_empty() {
        return Err(AppError::BadRequest("Reference url must not be empty".into()));
    }
    let session = state.engine.session(canvas_id).await?;
    let asset = ReferenceAsset::new(input.url, input.kind);
    session.add_reference(&node_id, asset.clone()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: asset })))
}

/// PUT /api/v1/canvases/{id}/nodes/{node_id}/references
///
/// Replace the node's references wholesale.
pub async fn replace_references(
    State(state): State<AppState>,
    Path((canvas_id, node_id)): Path<(CanvasId, NodeId)>,
    Json(input): Json<Vec<ReferenceAsset>>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    session.update_references(&node_id, input).await?;
    let node = session
        .node(&node_id)
        .await
        .ok_or(canvasgen_core::error::CoreError::StaleNodeReference(node_id))?;
    Ok(Json(DataResponse {
        data: node.references,
    }))
}

/// DELETE /api/v1/canvases/{id}/nodes/{node_id}/references/{ref_id}
pub async fn remove_reference(
    State(state): State<AppState>,
    Path((canvas_id, node_id, ref_id)): Path<(CanvasId, NodeId, String)>,
) -> AppResult<impl IntoResponse> {
    let session = state.engine.session(canvas_id).await?;
    session
        .remove_reference(&node_id, &ref_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reference {ref_id} not found on node {node_id}")))?;
    Ok(StatusCode::NO_CONTENT)
}
