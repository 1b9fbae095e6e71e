use std::sync::Arc;

use canvasgen_agent::ToolBridge;
use canvasgen_engine::Engine;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Canvas sessions, dispatch and reconciliation.
    pub engine: Arc<Engine>,
    /// Agent tool execution over the same engine.
    pub tools: Arc<ToolBridge>,
    /// Browser WebSocket connections, grouped by canvas.
    pub ws_manager: Arc<WsManager>,
    /// Database pool when persistence is backed by PostgreSQL.
    pub pool: Option<canvasgen_db::DbPool>,
}
