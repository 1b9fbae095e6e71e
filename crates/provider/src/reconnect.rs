//! Reconnecting to the job feed after a lost or refused connection.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{FeedClient, FeedConnection};

/// Backoff schedule for feed reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Growing wait between attempts, capped at `max_delay`.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    /// Schedule starting at `initial_delay`.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            next: config.initial_delay,
            config,
            attempts: 0,
        }
    }

    /// Attempts scheduled so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay to wait before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        let grown = current.mul_f64(self.config.multiplier);
        self.next = grown.min(self.config.max_delay);
        self.attempts += 1;
        current
    }
}

/// Keep dialling the feed until a connection succeeds or `cancel` fires.
/// Every attempt, the first included, is preceded by a backoff wait.
pub async fn reconnect_loop(
    client: &FeedClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<FeedConnection> {
    let mut backoff = Backoff::new(config.clone());

    loop {
        let delay = backoff.next_delay();
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let attempt = backoff.attempts();
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Dialling job feed");
        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => result,
        };
        match result {
            Ok(conn) => {
                tracing::info!(attempt, "Job feed reconnected");
                return Some(conn);
            }
            Err(e) => tracing::warn!(attempt, error = %e, "Job feed still unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_the_cap() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        let secs: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(secs, [1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(backoff.attempts(), 7);
    }

    #[tokio::test]
    async fn cancelled_loop_gives_up() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = FeedClient::new("ws://127.0.0.1:9");
        assert!(reconnect_loop(&client, &ReconnectConfig::default(), &cancel)
            .await
            .is_none());
    }
}
