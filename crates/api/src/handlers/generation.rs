//! Handler for starting a generation.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use canvasgen_core::canvas::GenerationRequest;
use canvasgen_core::types::{CanvasId, NodeId};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response of an accepted dispatch.
#[derive(Debug, Serialize)]
pub struct GenerationStarted {
    pub node_id: NodeId,
    /// Backend job id, when the backend reports one.
    pub generation_id: Option<String>,
}

/// POST /api/v1/canvases/{id}/nodes/{node_id}/generate
///
/// An empty body runs the node with its stored prompt, model and
/// parameters; a `{prompt, model_id, parameters}` body overrides them. The
/// result arrives later over the canvas WebSocket.
pub async fn generate(
    State(state): State<AppState>,
    Path((canvas_id, node_id)): Path<(CanvasId, NodeId)>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let request: GenerationRequest = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid generation request: {e}")))?;
        Some(request)
    };

    let ack = state.engine.dispatch(canvas_id, &node_id, request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: GenerationStarted {
                node_id,
                generation_id: ack.generation_id,
            },
        }),
    ))
}
