//! Push feed connection manager.
//!
//! [`PushFeedManager`] owns one persistent WebSocket connection to the job
//! feed. It spawns a connect -> process -> reconnect task, remembers every
//! watched node so interest survives reconnects, and fans job updates out
//! over a [`tokio::sync::broadcast`] channel.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use canvasgen_core::backend::JobFeed;
use canvasgen_core::job::JobUpdate;
use canvasgen_core::types::NodeId;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::client::{FeedClient, FeedConnection};
use crate::messages::FeedCommand;
use crate::processor::{process_messages, send_command, ProcessExit};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for job updates.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

type WatchedSet = Arc<RwLock<HashSet<NodeId>>>;

/// Created once at startup via [`PushFeedManager::start`]; the returned
/// `Arc` is shared with the engine as its [`JobFeed`].
pub struct PushFeedManager {
    watched: WatchedSet,
    update_tx: broadcast::Sender<JobUpdate>,
    command_tx: mpsc::UnboundedSender<FeedCommand>,
    /// Cancelled during shutdown.
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PushFeedManager {
    /// Connect to `feed_url` with the default backoff.
    pub fn start(feed_url: impl Into<String>) -> Arc<Self> {
        Self::start_with(FeedClient::new(feed_url), ReconnectConfig::default())
    }

    /// Start with an explicit client and backoff schedule.
    pub fn start_with(client: FeedClient, reconnect: ReconnectConfig) -> Arc<Self> {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let watched: WatchedSet = Arc::default();

        let task_handle = tokio::spawn({
            let watched = Arc::clone(&watched);
            let update_tx = update_tx.clone();
            let cancel = cancel.clone();
            async move {
                tracing::info!(feed_url = %client.feed_url(), "Starting job feed task");
                run_connection_loop(&client, &reconnect, &watched, command_rx, &update_tx, &cancel)
                    .await;
                tracing::info!("Job feed task exited");
            }
        });

        Arc::new(Self {
            watched,
            update_tx,
            command_tx,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    /// Nodes currently watched.
    pub async fn watched(&self) -> Vec<NodeId> {
        self.watched.read().await.iter().cloned().collect()
    }

    /// Stop the connection task, waiting up to 5 seconds for it to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job feed");
        self.cancel.cancel();
        if let Some(handle) = self.task_handle.lock().await.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        }
        tracing::info!("Job feed shut down complete");
    }

    /// Queue a command for the connection task. Dropped after shutdown.
    fn send(&self, command: FeedCommand) {
        // Fails only after shutdown; interest is then moot.
        let _ = self.command_tx.send(command);
    }
}

#[async_trait]
impl JobFeed for PushFeedManager {
    fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.update_tx.subscribe()
    }

    async fn watch(&self, node_id: &str) {
        if self.watched.write().await.insert(node_id.to_string()) {
            self.send(FeedCommand::Subscribe {
                node_id: node_id.to_string(),
            });
        }
    }

    async fn unwatch(&self, node_id: &str) {
        if self.watched.write().await.remove(node_id) {
            self.send(FeedCommand::Unsubscribe {
                node_id: node_id.to_string(),
            });
        }
    }
}

/// Core connection loop: connect -> resubscribe -> process -> reconnect.
///
/// Runs until the cancellation token is triggered.
async fn run_connection_loop(
    client: &FeedClient,
    reconnect: &ReconnectConfig,
    watched: &WatchedSet,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    update_tx: &broadcast::Sender<JobUpdate>,
    cancel: &CancellationToken,
) {
    let first = tokio::select! {
        _ = cancel.cancelled() => return,
        result = client.connect() => result,
    };
    let mut conn = match first {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Job feed connection failed, entering reconnect loop");
            match reconnect_loop(client, reconnect, cancel).await {
                Some(conn) => conn,
                None => return,
            }
        }
    };

    loop {
        resubscribe(&mut conn, watched).await;

        if process_messages(&mut conn.ws_stream, &mut commands, update_tx, cancel).await
            == ProcessExit::Stopped
            || cancel.is_cancelled()
        {
            return;
        }

        tracing::info!("Job feed connection lost, entering reconnect loop");
        conn = match reconnect_loop(client, reconnect, cancel).await {
            Some(conn) => conn,
            None => return,
        };
    }
}

/// Re-register every watched node on a fresh connection.
async fn resubscribe(conn: &mut FeedConnection, watched: &WatchedSet) {
    let nodes: Vec<NodeId> = watched.read().await.iter().cloned().collect();
    if nodes.is_empty() {
        return;
    }
    tracing::debug!(client_id = %conn.client_id, count = nodes.len(), "Resubscribing watched nodes");
    for node_id in nodes {
        if let Err(e) = send_command(&mut conn.ws_stream, &FeedCommand::Subscribe { node_id }).await {
            tracing::warn!(error = %e, "Resubscribe failed");
            return;
        }
    }
}
