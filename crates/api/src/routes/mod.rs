pub mod canvas;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /models                                          list catalog models (GET, ?type=)
/// /tools                                           agent tool definitions (GET)
///
/// /canvases/{id}                                   snapshot (GET)
/// /canvases/{id}/close                             flush and close (POST)
/// /canvases/{id}/selection                         set selection (PUT)
/// /canvases/{id}/tools                             execute agent tool (POST)
/// /canvases/{id}/ws                                live canvas events (WebSocket)
/// /canvases/{id}/nodes                             list, create
/// /canvases/{id}/nodes/{node_id}                   get, update (PATCH), delete
/// /canvases/{id}/nodes/{node_id}/generate          start generation (POST)
/// /canvases/{id}/nodes/{node_id}/references        add (POST), replace (PUT)
/// /canvases/{id}/nodes/{node_id}/references/{ref}  remove (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/models", get(handlers::models::list_models))
        .route("/tools", get(handlers::tools::list_tools))
        .nest("/canvases", canvas::router())
}
