//! Agent tool endpoints.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use canvasgen_core::types::CanvasId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /canvases/{id}/tools`.
#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    /// One of the names in the tool definitions.
    pub name: String,
    /// JSON object of tool arguments. Absent means none.
    #[serde(default)]
    pub arguments: Value,
}

/// Tool outcome. Failures are reported in the body with `ok: false`, never
/// as an HTTP error, so the agent can read and recover from them.
#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub ok: bool,
    /// Confirmation text on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Reason for the failure, worded for the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/v1/tools
pub async fn list_tools() -> impl IntoResponse {
    Json(DataResponse {
        data: canvasgen_agent::tool_definitions(),
    })
}

/// POST /api/v1/canvases/{id}/tools
pub async fn execute_tool(
    State(state): State<AppState>,
    Path(canvas_id): Path<CanvasId>,
    Json(input): Json<ToolCallRequest>,
) -> impl IntoResponse {
    let response = match state
        .tools
        .execute_raw(canvas_id, &input.name, input.arguments)
        .await
    {
        Ok(result) => ToolCallResponse {
            ok: true,
            result: Some(result),
            error: None,
        },
        Err(error) => ToolCallResponse {
            ok: false,
            result: None,
            error: Some(error),
        },
    };
    Json(response)
}
