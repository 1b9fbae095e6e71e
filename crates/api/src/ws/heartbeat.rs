use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// How often every viewer is pinged.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Ping every viewer each `every` until `cancel` fires. Browsers that stop
/// answering are dropped when their socket errors.
pub fn spawn_heartbeat(
    ws_manager: Arc<WsManager>,
    every: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let viewers = ws_manager.connection_count().await;
            if viewers > 0 {
                tracing::trace!(viewers, "Heartbeat");
                ws_manager.ping_all().await;
            }
        }
    })
}
