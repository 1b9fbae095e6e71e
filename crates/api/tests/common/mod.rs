#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use canvasgen_agent::ToolBridge;
use canvasgen_api::config::ServerConfig;
use canvasgen_api::router::build_app_router;
use canvasgen_api::state::AppState;
use canvasgen_api::ws::WsManager;
use canvasgen_core::backend::{CreditLedger, GenerationBackend, JobFeed};
use canvasgen_core::catalog::{AiModel, ModelCatalog, ModelKind};
use canvasgen_core::error::CoreError;
use canvasgen_core::job::{JobUpdate, SubmitAck, SubmitRequest};
use canvasgen_core::parameters::{ParamDescriptor, ParamType};
use canvasgen_engine::{Engine, EngineConfig, EngineDeps, MemoryCanvasStore};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Accepts every job unless `reject` is set.
#[derive(Default)]
pub struct FakeBackend {
    pub reject: AtomicBool,
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, CoreError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(CoreError::Upstream("backend unavailable".into()));
        }
        Ok(SubmitAck {
            accepted: true,
            generation_id: Some(format!("gen-{}", request.node_id)),
            detail: None,
        })
    }

    async fn job_status(&self, _node_id: &str) -> Result<Option<JobUpdate>, CoreError> {
        Ok(None)
    }
}

/// Job feed driven by the test through the sender.
pub struct FakeFeed(pub broadcast::Sender<JobUpdate>);

#[async_trait]
impl JobFeed for FakeFeed {
    fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.0.subscribe()
    }

    async fn watch(&self, _node_id: &str) {}

    async fn unwatch(&self, _node_id: &str) {}
}

/// Fixed credit balance.
pub struct FakeLedger(pub u32);

#[async_trait]
impl CreditLedger for FakeLedger {
    async fn balance(&self) -> Result<u32, CoreError> {
        Ok(self.0)
    }
}

/// One image and one video model, each with an aspect ratio select.
pub fn catalog() -> ModelCatalog {
    let aspect = ParamDescriptor::new("aspect_ratio", "Aspect ratio", ParamType::Select)
        .with_option("Square", "1:1")
        .with_option("Wide", "16:9")
        .with_default("1:1");
    let model = |id: &str, kind, cost| AiModel {
        id: id.into(),
        name: id.into(),
        kind,
        provider: None,
        cost_per_run: cost,
        is_active: true,
        parameter_schema: vec![aspect.clone()],
        icon_url: None,
    };
    ModelCatalog::new(vec![
        model("flux", ModelKind::Image, 4),
        model("kling", ModelKind::Video, 50),
    ])
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Default server config on an ephemeral port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        ..ServerConfig::default()
    }
}

/// Router plus handles on the collaborators behind it.
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<Engine>,
    pub backend: Arc<FakeBackend>,
    pub feed: Arc<FakeFeed>,
}

/// Build the full application router with the production middleware stack
/// over an in-memory engine. The ledger holds `balance` credits.
pub fn build_test_app(balance: u32) -> TestApp {
    let backend = Arc::new(FakeBackend::default());
    let (tx, _) = broadcast::channel(16);
    let feed = Arc::new(FakeFeed(tx));
    let engine = Arc::new(Engine::new(
        EngineDeps {
            backend: backend.clone(),
            feed: feed.clone(),
            ledger: Arc::new(FakeLedger(balance)),
            store: Arc::new(MemoryCanvasStore::new()),
        },
        catalog(),
        &EngineConfig::default(),
    ));

    let config = test_config();
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::clone(&engine),
        tools: Arc::new(ToolBridge::new(Arc::clone(&engine))),
        ws_manager: Arc::new(WsManager::new()),
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        engine,
        backend,
        feed,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send one request through the router.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// Send a GET request.
pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

/// Send a PATCH request with a JSON body.
pub async fn patch_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, Some(body)).await
}

/// Send a DELETE request.
pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
