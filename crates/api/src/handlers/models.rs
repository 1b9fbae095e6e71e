//! Model catalog endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use canvasgen_core::catalog::{AiModel, ModelKind};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query of `GET /models`.
#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/v1/models[?type=image|video|chat]
///
/// Active catalog models, optionally filtered by kind.
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> AppResult<impl IntoResponse> {
    let catalog = state.engine.catalog();
    let models: Vec<AiModel> = match query.kind.as_deref() {
        Some(kind) => {
            let kind: ModelKind = kind.parse().map_err(AppError::BadRequest)?;
            catalog.for_kind(kind).cloned().collect()
        }
        None => catalog.all().iter().filter(|m| m.is_active).cloned().collect(),
    };
    Ok(Json(DataResponse { data: models }))
}
