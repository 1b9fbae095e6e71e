use std::sync::Arc;
use std::time::Duration;

use canvasgen_agent::ToolBridge;
use canvasgen_core::backend::CanvasStore;
use canvasgen_core::catalog::ModelCatalog;
use canvasgen_engine::{Engine, EngineConfig, EngineDeps, MemoryCanvasStore};
use canvasgen_events::EventLogger;
use canvasgen_provider::{GenerationApi, PushFeedManager};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canvasgen_api::config::ServerConfig;
use canvasgen_api::router::build_app_router;
use canvasgen_api::state::AppState;
use canvasgen_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "canvasgen_api=debug,canvasgen_engine=debug,canvasgen_provider=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    let engine_config = EngineConfig::from_env().expect("Invalid engine configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = %engine_config.backend_url,
        feed = %engine_config.feed_url,
        "Loaded configuration",
    );

    // --- Canvas persistence ---
    let (store, pool) = match &config.database_url {
        Some(database_url) => {
            let pool = canvasgen_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            canvasgen_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            canvasgen_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database ready, canvases are persisted to PostgreSQL");
            let store: Arc<dyn CanvasStore> =
                Arc::new(canvasgen_db::PgCanvasStore::new(pool.clone()));
            (store, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, canvases are kept in memory only");
            let store: Arc<dyn CanvasStore> = Arc::new(MemoryCanvasStore::new());
            (store, None)
        }
    };

    // --- Generation backend ---
    let api = Arc::new(
        GenerationApi::new(engine_config.backend_url.clone())
            .expect("Failed to build backend HTTP client"),
    );
    let catalog = match api.list_models(None).await {
        Ok(models) => ModelCatalog::new(models),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load model catalog, starting with none");
            ModelCatalog::default()
        }
    };
    if let Err(e) = catalog.validate() {
        tracing::warn!(error = %e, "Model catalog has an invalid parameter schema");
    }
    tracing::info!(models = catalog.all().len(), "Model catalog loaded");

    let feed = PushFeedManager::start(engine_config.feed_url.clone());
    tracing::info!("Job feed started");

    // --- Engine ---
    let engine = Arc::new(Engine::new(
        EngineDeps {
            backend: api.clone(),
            feed: feed.clone(),
            ledger: api,
            store,
        },
        catalog,
        &engine_config,
    ));
    let tools = Arc::new(ToolBridge::new(Arc::clone(&engine)));

    let eviction_cancel = CancellationToken::new();
    let eviction_handle = {
        let engine = Arc::clone(&engine);
        let cancel = eviction_cancel.clone();
        tokio::spawn(async move { engine.run_idle_eviction(cancel).await })
    };

    // --- WebSocket + event services ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let events_cancel = CancellationToken::new();
    let heartbeat_handle = ws::spawn_heartbeat(
        Arc::clone(&ws_manager),
        ws::HEARTBEAT_INTERVAL,
        events_cancel.clone(),
    );
    let forwarder_handle = tokio::spawn(
        ws::EventForwarder::new(Arc::clone(&ws_manager))
            .run(engine.events().subscribe(), events_cancel.clone()),
    );
    let logger_handle = tokio::spawn(EventLogger::run(engine.events().subscribe()));

    // --- Router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::clone(&engine),
        tools,
        ws_manager: Arc::clone(&ws_manager),
        pool,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = config.bind_addr();
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let cleanup_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    eviction_cancel.cancel();
    let _ = eviction_handle.await;

    // Flush canvases while the store is still reachable.
    if tokio::time::timeout(cleanup_timeout, engine.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Engine shutdown timed out, unsaved canvas changes may be lost");
    }

    feed.shutdown().await;
    tracing::info!("Job feed shut down");

    events_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), forwarder_handle).await;
    let _ = heartbeat_handle.await;
    logger_handle.abort();

    ws_manager.close_all().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
