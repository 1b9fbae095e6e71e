//! Result reconciliation channel.
//!
//! Every generating node gets one tracker task fed by two producers: the
//! push feed (updates matching the node id) and a status poll every
//! `poll_interval`. Both deliver into the session's idempotent
//! `receive_result`, so whichever arrives second is a no-op.
//!
//! A tracker ends when its node leaves `Generating`, is deleted, its
//! session is dropped, or the channel shuts down. Each tracker owns a
//! [`TrackerGuard`] that releases feed interest and the registry entry
//! exactly once, whichever way the task exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use canvasgen_core::backend::{GenerationBackend, JobFeed};
use canvasgen_core::canvas::ReceiveOutcome;
use canvasgen_core::job::JobUpdate;
use canvasgen_core::types::NodeId;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Consumer of job results. Implemented by `CanvasSession`.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Apply an observed job update to the node it names.
    async fn receive_result(&self, update: &JobUpdate) -> ReceiveOutcome;

    /// `None` when the node no longer exists.
    async fn is_generating(&self, node_id: &str) -> Option<bool>;
}

/// Registry entry for one tracked node. `id` tells a replaced tracker
/// apart from the current one when its guard drops late.
struct TrackerEntry {
    id: u64,
    cancel: CancellationToken,
}

type TrackerMap = Arc<Mutex<HashMap<NodeId, TrackerEntry>>>;

/// Per-node trackers merging the push feed with the status poll.
pub struct ReconciliationChannel {
    backend: Arc<dyn GenerationBackend>,
    feed: Arc<dyn JobFeed>,
    poll_interval: Duration,
    trackers: TrackerMap,
    next_id: AtomicU64,
    /// Parent of every tracker token.
    cancel: CancellationToken,
}

impl ReconciliationChannel {
    /// Trackers poll `backend` every `poll_interval` and listen on `feed`.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        feed: Arc<dyn JobFeed>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            feed,
            poll_interval,
            trackers: Arc::default(),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Start tracking `node_id`, replacing any previous tracker for it.
    ///
    /// Feed interest is registered and the update stream subscribed before
    /// this returns, so a job submitted afterwards cannot slip past.
    pub async fn track(&self, node_id: &str, sink: Weak<dyn ResultSink>) {
        let updates = self.feed.subscribe();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.cancel.child_token();

        let previous = lock(&self.trackers).insert(
            node_id.to_string(),
            TrackerEntry {
                id,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        self.feed.watch(node_id).await;

        let guard = TrackerGuard {
            id,
            node_id: node_id.to_string(),
            trackers: Arc::clone(&self.trackers),
            feed: Arc::clone(&self.feed),
        };
        let tracker = Tracker {
            node_id: node_id.to_string(),
            sink,
            backend: Arc::clone(&self.backend),
            poll_interval: self.poll_interval,
        };

        tracing::debug!(node_id, tracker_id = id, "Tracking generation");
        tokio::spawn(tracker.run(updates, cancel, guard));
    }

    /// Stop tracking `node_id`. Its guard releases feed interest.
    pub fn untrack(&self, node_id: &str) {
        if let Some(entry) = lock(&self.trackers).remove(node_id) {
            entry.cancel.cancel();
        }
    }

    /// Whether a tracker is live for `node_id`.
    pub fn is_tracking(&self, node_id: &str) -> bool {
        lock(&self.trackers).contains_key(node_id)
    }

    /// Live trackers across all canvases.
    pub fn tracked_count(&self) -> usize {
        lock(&self.trackers).len()
    }

    /// Cancel every tracker.
    pub fn shutdown(&self) {
        tracing::info!(count = self.tracked_count(), "Shutting down reconciliation channel");
        self.cancel.cancel();
    }
}

/// Lock the tracker map, recovering from poisoning.
fn lock(trackers: &TrackerMap) -> std::sync::MutexGuard<'_, HashMap<NodeId, TrackerEntry>> {
    // A panic while holding the lock leaves the map itself consistent.
    trackers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Releases a tracker's registry entry and feed interest on drop.
struct TrackerGuard {
    id: u64,
    node_id: NodeId,
    trackers: TrackerMap,
    feed: Arc<dyn JobFeed>,
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        let mut trackers = lock(&self.trackers);
        let release = match trackers.get(&self.node_id) {
            Some(entry) if entry.id == self.id => {
                trackers.remove(&self.node_id);
                true
            }
            // Replaced by a newer tracker that owns the interest now.
            Some(_) => false,
            None => true,
        };
        drop(trackers);

        if !release {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let node_id = self.node_id.clone();
        let trackers = Arc::clone(&self.trackers);
        let feed = Arc::clone(&self.feed);
        handle.spawn(async move {
            if !lock(&trackers).contains_key(&node_id) {
                feed.unwatch(&node_id).await;
            }
        });
        tracing::debug!(node_id = %self.node_id, tracker_id = self.id, "Tracker released");
    }
}

// ---------------------------------------------------------------------------
// Tracker task
// ---------------------------------------------------------------------------

/// Follows one node until its job settles or the node leaves `Generating`.
struct Tracker {
    node_id: NodeId,
    sink: Weak<dyn ResultSink>,
    backend: Arc<dyn GenerationBackend>,
    poll_interval: Duration,
}

/// Whether the tracker loop keeps going after handling an update.
enum Step {
    Continue,
    Stop,
}

impl Tracker {
    async fn run(
        self,
        mut updates: broadcast::Receiver<JobUpdate>,
        cancel: CancellationToken,
        _guard: TrackerGuard,
    ) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut push_open = true;

        loop {
            let update = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.still_generating().await {
                        Step::Stop => break,
                        Step::Continue => {}
                    }
                    self.poll().await
                }
                received = updates.recv(), if push_open => match received {
                    Ok(update) if update.node_id == self.node_id => Some(update),
                    Ok(_) => None,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(node_id = %self.node_id, skipped, "Job feed lagged, polling now");
                        self.poll().await
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!(node_id = %self.node_id, "Job feed closed, continuing with polling only");
                        push_open = false;
                        None
                    }
                },
            };

            if let Some(update) = update {
                if let Step::Stop = self.deliver(&update).await {
                    break;
                }
            }
        }
    }

    /// Stop once the node has left `Generating` or the session is gone.
    async fn still_generating(&self) -> Step {
        let Some(sink) = self.sink.upgrade() else {
            return Step::Stop;
        };
        match sink.is_generating(&self.node_id).await {
            Some(true) => Step::Continue,
            _ => Step::Stop,
        }
    }

    /// Only terminal observations are worth delivering from a poll.
    async fn poll(&self) -> Option<JobUpdate> {
        match self.backend.job_status(&self.node_id).await {
            Ok(update) => update.filter(|u| u.status.is_terminal()),
            Err(e) => {
                tracing::warn!(node_id = %self.node_id, error = %e, "Job status poll failed");
                None
            }
        }
    }

    /// Hand an update to the session and decide whether to keep tracking.
    async fn deliver(&self, update: &JobUpdate) -> Step {
        let Some(sink) = self.sink.upgrade() else {
            return Step::Stop;
        };
        match sink.receive_result(update).await {
            ReceiveOutcome::Applied(_) | ReceiveOutcome::Duplicate | ReceiveOutcome::StaleNode => {
                Step::Stop
            }
            ReceiveOutcome::Ignored => match sink.is_generating(&self.node_id).await {
                Some(true) => Step::Continue,
                _ => Step::Stop,
            },
        }
    }
}
