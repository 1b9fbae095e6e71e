//! Open canvas sessions, loaded on first use and closed when idle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use canvasgen_core::backend::CanvasStore;
use canvasgen_core::canvas::Canvas;
use canvasgen_core::catalog::ModelCatalog;
use canvasgen_core::error::CoreError;
use canvasgen_core::node::NodeStatus;
use canvasgen_core::types::CanvasId;
use canvasgen_events::EventBus;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::autosave::Autosave;
use crate::config::AutosaveConfig;
use crate::reconcile::{ReconciliationChannel, ResultSink};
use crate::session::CanvasSession;

/// Who is using an open session, and since when nobody has.
#[derive(Debug)]
struct Activity {
    watchers: AtomicUsize,
    last_used: Mutex<Instant>,
}

impl Activity {
    fn new() -> Self {
        Self {
            watchers: AtomicUsize::new(0),
            last_used: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_used.lock() {
            *last = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }
}

/// Keeps a session open while held. Dropping the last lease starts the
/// idle clock.
#[derive(Debug)]
pub struct SessionLease {
    activity: Arc<Activity>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.activity.touch();
        self.activity.watchers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A loaded session with the autosave task that belongs to it.
struct OpenSession {
    session: Arc<CanvasSession>,
    activity: Arc<Activity>,
    autosave_cancel: CancellationToken,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

/// Filled once per canvas. Loads happen outside the map lock, so a slow
/// store read only holds up callers of the same canvas.
type SessionSlot = Arc<OnceCell<OpenSession>>;

/// Open sessions keyed by canvas id.
pub struct SessionRegistry {
    store: Arc<dyn CanvasStore>,
    catalog: Arc<ModelCatalog>,
    events: Arc<EventBus>,
    reconciler: Arc<ReconciliationChannel>,
    autosave: AutosaveConfig,
    /// Unwatched sessions unused for this long are closed by the sweep.
    idle_after: Duration,
    sessions: Mutex<HashMap<CanvasId, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn CanvasStore>,
        catalog: Arc<ModelCatalog>,
        events: Arc<EventBus>,
        reconciler: Arc<ReconciliationChannel>,
        autosave: AutosaveConfig,
        idle_after: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            events,
            reconciler,
            autosave,
            idle_after,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<CanvasId, SessionSlot>> {
        // A panic while holding the map leaves it consistent; keep serving.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, canvas_id: CanvasId) -> SessionSlot {
        Arc::clone(self.slots().entry(canvas_id).or_default())
    }

    /// Return the open session for `canvas_id`, loading its snapshot (or
    /// starting an empty canvas) on first use.
    pub async fn get_or_load(&self, canvas_id: CanvasId) -> Result<Arc<CanvasSession>, CoreError> {
        let open = self.open(canvas_id).await?;
        open.activity.touch();
        Ok(Arc::clone(&open.session))
    }

    /// Like [`get_or_load`](Self::get_or_load), also handing out a lease
    /// that keeps the session from being evicted while a viewer is attached.
    pub async fn watch(
        &self,
        canvas_id: CanvasId,
    ) -> Result<(Arc<CanvasSession>, SessionLease), CoreError> {
        let open = self.open(canvas_id).await?;
        open.activity.watchers.fetch_add(1, Ordering::SeqCst);
        open.activity.touch();
        let lease = SessionLease {
            activity: Arc::clone(&open.activity),
        };
        Ok((Arc::clone(&open.session), lease))
    }

    /// Open session for `canvas_id`, loading it on first use.
    async fn open(&self, canvas_id: CanvasId) -> Result<OpenRef, CoreError> {
        let slot = self.slot(canvas_id);
        match slot.get_or_try_init(|| self.load(canvas_id)).await {
            Ok(open) => Ok(OpenRef {
                session: Arc::clone(&open.session),
                activity: Arc::clone(&open.activity),
            }),
            Err(e) => {
                // Drop the empty slot so a later call retries the load.
                let mut slots = self.slots();
                if slots
                    .get(&canvas_id)
                    .is_some_and(|s| Arc::ptr_eq(s, &slot) && s.get().is_none())
                {
                    slots.remove(&canvas_id);
                }
                Err(e)
            }
        }
    }

    /// Nodes restored in `Generating` are handed back to the reconciliation
    /// channel so results that landed while the canvas was closed are
    /// picked up by the next poll.
    async fn load(&self, canvas_id: CanvasId) -> Result<OpenSession, CoreError> {
        let canvas = match self.store.load(canvas_id).await? {
            Some(snapshot) => Canvas::from_snapshot(snapshot)?,
            None => Canvas::new(canvas_id),
        };
        let pending: Vec<_> = canvas
            .nodes()
            .filter(|n| n.status == NodeStatus::Generating)
            .map(|n| n.id.clone())
            .collect();
        tracing::info!(%canvas_id, nodes = canvas.len(), pending = pending.len(), "Canvas session opened");

        let session = Arc::new(CanvasSession::new(
            canvas,
            Arc::clone(&self.catalog),
            Arc::clone(&self.events),
            Arc::clone(&self.reconciler),
        ));
        let sink: Arc<dyn ResultSink> = Arc::clone(&session) as Arc<dyn ResultSink>;
        for node_id in &pending {
            let sink: Weak<dyn ResultSink> = Arc::downgrade(&sink);
            self.reconciler.track(node_id, sink).await;
        }

        let autosave_cancel = CancellationToken::new();
        let autosave = tokio::spawn(
            Autosave::new(
                Arc::clone(&session),
                Arc::clone(&self.store),
                self.autosave.clone(),
            )
            .run(autosave_cancel.clone()),
        );

        Ok(OpenSession {
            session,
            activity: Arc::new(Activity::new()),
            autosave_cancel,
            autosave: Mutex::new(Some(autosave)),
        })
    }

    /// Number of fully loaded sessions.
    pub async fn open_count(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    /// Close a session: flush unsaved changes and stop tracking its nodes.
    /// Returns `false` when the canvas was not open.
    pub async fn close(&self, canvas_id: CanvasId) -> bool {
        let Some(slot) = self.slots().remove(&canvas_id) else {
            return false;
        };
        let Some(open) = slot.get() else {
            return false;
        };
        self.release(open).await;
        tracing::info!(%canvas_id, "Canvas session closed");
        true
    }

    /// Close every open session.
    pub async fn close_all(&self) {
        let slots: Vec<_> = self.slots().drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            if let Some(open) = slot.get() {
                self.release(open).await;
            }
        }
    }

    /// Close sessions nobody watches that have been unused for the idle
    /// period. Sessions with a node still generating stay open so their
    /// result is applied and published live. Returns how many were closed.
    pub async fn evict_idle(&self) -> usize {
        let candidates: Vec<(CanvasId, SessionSlot)> = self
            .slots()
            .iter()
            .filter(|(_, slot)| {
                slot.get().is_some_and(|open| {
                    open.activity.watchers.load(Ordering::SeqCst) == 0
                        && open.activity.idle_for() >= self.idle_after
                })
            })
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut evicted = 0;
        for (canvas_id, slot) in candidates {
            let Some(open) = slot.get() else { continue };
            if open.session.generating_node().await.is_some() {
                continue;
            }
            {
                let mut slots = self.slots();
                // Skip if the slot was replaced or picked up a viewer meanwhile.
                let unchanged = slots.get(&canvas_id).is_some_and(|s| Arc::ptr_eq(s, &slot));
                if !unchanged || open.activity.watchers.load(Ordering::SeqCst) > 0 {
                    continue;
                }
                slots.remove(&canvas_id);
            }
            self.release(open).await;
            tracing::info!(%canvas_id, "Idle canvas session closed");
            evicted += 1;
        }
        evicted
    }

    /// Sweep for idle sessions until `cancel` fires.
    pub async fn run_eviction(&self, cancel: CancellationToken) {
        let every = (self.idle_after / 2).max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.evict_idle().await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "Idle session sweep");
                    }
                }
            }
        }
    }

    /// Stop autosave after its final flush and drop the session's trackers.
    async fn release(&self, open: &OpenSession) {
        open.autosave_cancel.cancel();
        let handle = open.autosave.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(canvas_id = %open.session.id(), error = %e, "Autosave task failed");
            }
        }
        for node in open.session.nodes().await {
            if node.status == NodeStatus::Generating {
                self.reconciler.untrack(&node.id);
            }
        }
    }
}

/// Owned handles to an open session, taken without holding the map lock.
struct OpenRef {
    session: Arc<CanvasSession>,
    activity: Arc<Activity>,
}
