//! Route definitions for canvases, mounted at `/canvases`.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::{canvas, generation, tools};
use crate::state::AppState;
use crate::ws;

/// ```text
/// GET    /{id}                                    -> get_canvas
/// POST   /{id}/close                              -> close_canvas
/// PUT    /{id}/selection                          -> set_selection
/// POST   /{id}/tools                              -> execute_tool
/// GET    /{id}/ws                                 -> canvas_ws_handler
/// GET    /{id}/nodes                              -> list_nodes
/// POST   /{id}/nodes                              -> create_node
/// GET    /{id}/nodes/{node_id}                    -> get_node
/// PATCH  /{id}/nodes/{node_id}                    -> update_node
/// DELETE /{id}/nodes/{node_id}                    -> delete_node
/// POST   /{id}/nodes/{node_id}/generate           -> generate
/// POST   /{id}/nodes/{node_id}/references         -> add_reference
/// PUT    /{id}/nodes/{node_id}/references         -> replace_references
/// DELETE /{id}/nodes/{node_id}/references/{ref}   -> remove_reference
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(canvas::get_canvas))
        .route("/{id}/close", post(canvas::close_canvas))
        .route("/{id}/selection", put(canvas::set_selection))
        .route("/{id}/tools", post(tools::execute_tool))
        .route("/{id}/ws", get(ws::canvas_ws_handler))
        .route(
            "/{id}/nodes",
            get(canvas::list_nodes).post(canvas::create_node),
        )
        .route(
            "/{id}/nodes/{node_id}",
            get(canvas::get_node)
                .patch(canvas::update_node)
                .delete(canvas::delete_node),
        )
        .route(
            "/{id}/nodes/{node_id}/generate",
            post(generation::generate),
        )
        .route(
            "/{id}/nodes/{node_id}/references",
            post(canvas::add_reference).put(canvas::replace_references),
        )
        .route(
            "/{id}/nodes/{node_id}/references/{ref_id}",
            delete(canvas::remove_reference),
        )
}
