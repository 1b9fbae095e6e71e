//! In-memory collaborators for engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use canvasgen_core::backend::{CreditLedger, GenerationBackend, JobFeed};
use canvasgen_core::catalog::{AiModel, ModelCatalog, ModelKind};
use canvasgen_core::error::CoreError;
use canvasgen_core::job::{JobUpdate, SubmitAck, SubmitRequest};
use canvasgen_core::parameters::{ParamDescriptor, ParamType};
use canvasgen_engine::{AutosaveConfig, Engine, EngineConfig, EngineDeps, MemoryCanvasStore};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Records every submission. Answers are controlled by the flags.
#[derive(Default)]
pub struct FakeBackend {
    /// Submissions are refused with `accepted: false`.
    pub reject: AtomicBool,
    /// Submissions are recorded but never answered.
    pub hang: AtomicBool,
    pub submitted: Mutex<Vec<SubmitRequest>>,
    /// Poll answers by node id. Unknown nodes report no job.
    pub statuses: Mutex<HashMap<String, JobUpdate>>,
    /// Status polls served so far.
    pub polls: AtomicUsize,
}

impl FakeBackend {
    /// Answer the next status polls for the node with `update`.
    pub fn set_status(&self, update: JobUpdate) {
        self.statuses
            .lock()
            .unwrap()
            .insert(update.node_id.clone(), update);
    }

    /// Submissions received so far, in order.
    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, CoreError> {
        self.submitted.lock().unwrap().push(request.clone());
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Ok(SubmitAck {
                accepted: false,
                generation_id: None,
                detail: Some("queue full".into()),
            });
        }
        Ok(SubmitAck {
            accepted: true,
            generation_id: Some(format!("gen-{}", request.node_id)),
            detail: None,
        })
    }

    async fn job_status(&self, node_id: &str) -> Result<Option<JobUpdate>, CoreError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses.lock().unwrap().get(node_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Job feed the test pushes updates into.
pub struct FakeFeed {
    tx: broadcast::Sender<JobUpdate>,
    /// Nodes currently subscribed through `watch`.
    pub watched: Mutex<HashSet<String>>,
}

impl Default for FakeFeed {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            watched: Mutex::default(),
        }
    }
}

impl FakeFeed {
    /// Publish an update to every tracker.
    pub fn push(&self, update: JobUpdate) {
        let _ = self.tx.send(update);
    }

    /// Whether a tracker has asked for pushes about the node.
    pub fn is_watching(&self, node_id: &str) -> bool {
        self.watched.lock().unwrap().contains(node_id)
    }
}

#[async_trait]
impl JobFeed for FakeFeed {
    fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.tx.subscribe()
    }

    async fn watch(&self, node_id: &str) {
        self.watched.lock().unwrap().insert(node_id.to_string());
    }

    async fn unwatch(&self, node_id: &str) {
        self.watched.lock().unwrap().remove(node_id);
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Credit ledger with an adjustable balance that can go offline.
pub struct FakeLedger {
    pub balance: AtomicU32,
    /// Balance lookups fail while set.
    pub offline: AtomicBool,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            balance: AtomicU32::new(100),
            offline: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CreditLedger for FakeLedger {
    async fn balance(&self) -> Result<u32, CoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::Upstream("ledger offline".into()));
        }
        Ok(self.balance.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Active model with a single aspect ratio select.
pub fn model(id: &str, kind: ModelKind, cost: u32) -> AiModel {
    AiModel {
        id: id.into(),
        name: id.to_uppercase(),
        kind,
        provider: None,
        cost_per_run: cost,
        is_active: true,
        parameter_schema: vec![ParamDescriptor::new("aspect_ratio", "Aspect ratio", ParamType::Select)
            .with_option("Square", "1:1")
            .with_option("Wide", "16:9")
            .with_default("1:1")],
        icon_url: None,
    }
}

/// `flux` for images and `kling` for video.
pub fn catalog() -> ModelCatalog {
    ModelCatalog::new(vec![
        model("flux", ModelKind::Image, 4),
        model("kling", ModelKind::Video, 10),
    ])
}

/// Engine settings used by every harness.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_secs(5),
        autosave: AutosaveConfig::default(),
        ..EngineConfig::default()
    }
}

/// Engine under test plus the fakes it was built from.
pub struct Harness {
    pub engine: Engine,
    pub backend: Arc<FakeBackend>,
    pub feed: Arc<FakeFeed>,
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<MemoryCanvasStore>,
}

/// Harness over an empty in-memory store.
pub fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryCanvasStore::new()))
}

/// Harness over a caller-provided store, for restore tests.
pub fn harness_with_store(store: Arc<MemoryCanvasStore>) -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let feed = Arc::new(FakeFeed::default());
    let ledger = Arc::new(FakeLedger::default());
    let engine = Engine::new(
        EngineDeps {
            backend: backend.clone(),
            feed: feed.clone(),
            ledger: ledger.clone(),
            store: store.clone(),
        },
        catalog(),
        &test_config(),
    );
    Harness {
        engine,
        backend,
        feed,
        ledger,
        store,
    }
}

/// Let spawned tasks run without advancing paused time.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
