//! Engine facade wiring sessions, dispatch and reconciliation together.

use std::sync::Arc;

use canvasgen_core::backend::{CanvasStore, CreditLedger, GenerationBackend, JobFeed};
use canvasgen_core::canvas::GenerationRequest;
use canvasgen_core::catalog::ModelCatalog;
use canvasgen_core::error::CoreError;
use canvasgen_core::job::SubmitAck;
use canvasgen_core::types::CanvasId;
use canvasgen_events::EventBus;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::reconcile::ReconciliationChannel;
use crate::registry::{SessionLease, SessionRegistry};
use crate::session::CanvasSession;

/// External collaborators the engine is built from.
pub struct EngineDeps {
    /// Accepts job submissions.
    pub backend: Arc<dyn GenerationBackend>,
    /// Push channel of job updates.
    pub feed: Arc<dyn JobFeed>,
    /// Credit balance checked before each dispatch.
    pub ledger: Arc<dyn CreditLedger>,
    /// Where snapshots are loaded from and saved to.
    pub store: Arc<dyn CanvasStore>,
}

/// Entry point for HTTP handlers and agent tools.
pub struct Engine {
    catalog: Arc<ModelCatalog>,
    events: Arc<EventBus>,
    reconciler: Arc<ReconciliationChannel>,
    dispatcher: Dispatcher,
    sessions: SessionRegistry,
}

impl Engine {
    /// Wire the engine. Spawns nothing until a canvas is opened.
    pub fn new(deps: EngineDeps, catalog: ModelCatalog, config: &EngineConfig) -> Self {
        let catalog = Arc::new(catalog);
        let events = Arc::new(EventBus::default());
        let reconciler = Arc::new(ReconciliationChannel::new(
            Arc::clone(&deps.backend),
            deps.feed,
            config.poll_interval,
        ));
        let dispatcher = Dispatcher::new(
            deps.backend,
            deps.ledger,
            Arc::clone(&reconciler),
            config.submit_timeout,
        );
        let sessions = SessionRegistry::new(
            deps.store,
            Arc::clone(&catalog),
            Arc::clone(&events),
            Arc::clone(&reconciler),
            config.autosave.clone(),
            config.session_idle,
        );

        Self {
            catalog,
            events,
            reconciler,
            dispatcher,
            sessions,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Bus carrying every canvas event.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Result trackers, exposed for health reporting and tests.
    pub fn reconciler(&self) -> &ReconciliationChannel {
        &self.reconciler
    }

    /// Open canvas sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Open (or load) the session for `canvas_id`.
    pub async fn session(&self, canvas_id: CanvasId) -> Result<Arc<CanvasSession>, CoreError> {
        self.sessions.get_or_load(canvas_id).await
    }

    /// Open `canvas_id` for a live viewer. The session stays open at least
    /// as long as the returned lease.
    pub async fn watch(
        &self,
        canvas_id: CanvasId,
    ) -> Result<(Arc<CanvasSession>, SessionLease), CoreError> {
        self.sessions.watch(canvas_id).await
    }

    /// Close idle canvases in the background until `cancel` fires.
    pub async fn run_idle_eviction(&self, cancel: CancellationToken) {
        self.sessions.run_eviction(cancel).await
    }

    /// Dispatch a generation for `node_id` on `canvas_id`.
    pub async fn dispatch(
        &self,
        canvas_id: CanvasId,
        node_id: &str,
        request: Option<GenerationRequest>,
    ) -> Result<SubmitAck, CoreError> {
        let session = self.session(canvas_id).await?;
        self.dispatcher.dispatch(&session, node_id, request).await
    }

    /// Flush every open canvas and stop all trackers.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down generation engine");
        self.sessions.close_all().await;
        self.reconciler.shutdown();
    }
}
