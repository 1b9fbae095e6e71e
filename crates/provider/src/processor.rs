//! Feed message processing loop.
//!
//! Reads frames from a live feed connection, forwards job updates to the
//! broadcast channel and writes queued subscribe/unsubscribe commands back
//! to the socket.

use canvasgen_core::job::JobUpdate;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{FeedClientError, FeedStream};
use crate::messages::{parse_message, FeedCommand, FeedMessage};

/// Why [`process_messages`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The socket closed or failed; the caller should reconnect.
    Disconnected,
    /// Shutdown was requested or the command channel closed.
    Stopped,
}

/// Process one connection until it drops or the feed is stopped.
pub async fn process_messages(
    ws_stream: &mut FeedStream,
    commands: &mut mpsc::UnboundedReceiver<FeedCommand>,
    update_tx: &broadcast::Sender<JobUpdate>,
    cancel: &CancellationToken,
) -> ProcessExit {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_stream.close(None).await;
                return ProcessExit::Stopped;
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    return ProcessExit::Stopped;
                };
                if let Err(e) = send_command(ws_stream, &command).await {
                    tracing::warn!(error = %e, "Failed to send feed command");
                    return ProcessExit::Disconnected;
                }
            }
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text_message(&text, update_tx),
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary feed frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Job feed closed the connection");
                    return ProcessExit::Disconnected;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Job feed receive error");
                    return ProcessExit::Disconnected;
                }
                None => return ProcessExit::Disconnected,
            }
        }
    }
}

/// Write a single command frame.
pub async fn send_command(
    ws_stream: &mut FeedStream,
    command: &FeedCommand,
) -> Result<(), FeedClientError> {
    let text =
        serde_json::to_string(command).map_err(|e| FeedClientError::Protocol(e.to_string()))?;
    ws_stream
        .send(Message::Text(text))
        .await
        .map_err(|e| FeedClientError::Protocol(e.to_string()))
}

/// Decode one feed frame and republish job updates. Other frames are
/// logged and dropped.
fn handle_text_message(text: &str, update_tx: &broadcast::Sender<JobUpdate>) {
    match parse_message(text) {
        Ok(FeedMessage::JobUpdate(update)) => {
            tracing::debug!(
                node_id = %update.node_id,
                status = ?update.status,
                "Job update received",
            );
            let _ = update_tx.send(update);
        }
        Ok(FeedMessage::Subscribed(data)) => {
            tracing::debug!(node_id = %data.node_id, "Feed subscription confirmed");
        }
        Ok(FeedMessage::Heartbeat(_)) => {
            tracing::trace!("Feed heartbeat");
        }
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to parse feed message");
        }
    }
}
