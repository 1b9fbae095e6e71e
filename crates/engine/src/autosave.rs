//! Debounced canvas autosave.
//!
//! One task per session. It saves once the canvas has been quiet for
//! `debounce`, never more often than `min_interval`, at least every
//! `periodic` while dirty, and once more on shutdown. Dirtiness is the
//! session revision compared with the last saved revision.

use std::sync::Arc;

use canvasgen_core::backend::CanvasStore;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::AutosaveConfig;
use crate::session::CanvasSession;

/// Debounced saver for one session.
///
/// Saves after a quiet period following the last change, never more often
/// than the minimum interval, and at least every periodic interval while
/// changes are pending.
pub struct Autosave {
    session: Arc<CanvasSession>,
    store: Arc<dyn CanvasStore>,
    config: AutosaveConfig,
    saved_revision: u64,
    last_save: Option<Instant>,
}

impl Autosave {
    /// The session is considered clean at its current revision.
    pub fn new(
        session: Arc<CanvasSession>,
        store: Arc<dyn CanvasStore>,
        config: AutosaveConfig,
    ) -> Self {
        let saved_revision = session.revision();
        Self {
            session,
            store,
            config,
            saved_revision,
            last_save: None,
        }
    }

    /// Run until `cancel` fires, then make a final save if dirty.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut periodic = tokio::time::interval_at(
            Instant::now() + self.config.periodic,
            self.config.periodic,
        );
        periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.session.changed() => {
                    if !self.settle(&mut periodic, &cancel).await {
                        break;
                    }
                    self.save_if_dirty().await;
                }
                _ = periodic.tick() => self.save_if_dirty().await,
            }
        }

        self.save_if_dirty().await;
        tracing::debug!(canvas_id = %self.session.id(), "Autosave stopped");
    }

    /// Wait out the debounce window and the minimum save spacing. A
    /// periodic tick cuts the debounce short under continuous editing.
    /// Returns `false` when cancelled meanwhile.
    async fn settle(&self, periodic: &mut Interval, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = self.session.changed() => continue,
                _ = tokio::time::sleep(self.config.debounce) => break,
                _ = periodic.tick() => break,
            }
        }

        if let Some(last) = self.last_save {
            let earliest = last + self.config.min_interval;
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep_until(earliest) => {}
            }
        }
        true
    }

    /// Save when the revision moved since the last successful save. A failed
    /// save keeps the canvas dirty for the next attempt.
    async fn save_if_dirty(&mut self) {
        let revision = self.session.revision();
        if revision == self.saved_revision {
            return;
        }

        let snapshot = self.session.snapshot().await;
        match self.store.save(self.session.id(), &snapshot).await {
            Ok(()) => {
                self.saved_revision = revision;
                self.last_save = Some(Instant::now());
                self.session.publish_saved(revision);
                tracing::debug!(canvas_id = %self.session.id(), revision, "Canvas autosaved");
            }
            Err(e) => {
                tracing::warn!(canvas_id = %self.session.id(), error = %e, "Canvas autosave failed");
            }
        }
    }
}
