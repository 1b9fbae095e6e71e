use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable; `null` when running without one.
    pub db_healthy: Option<bool>,
    /// Canvases with an open session.
    pub open_canvases: usize,
    /// Nodes currently awaiting a generation result.
    pub tracked_generations: usize,
}

/// GET /health -- returns service and database health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match &state.pool {
        Some(pool) => Some(canvasgen_db::health_check(pool).await.is_ok()),
        None => None,
    };

    let status = if db_healthy == Some(false) { "degraded" } else { "ok" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        open_canvases: state.engine.sessions().open_count().await,
        tracked_generations: state.engine.reconciler().tracked_count(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
