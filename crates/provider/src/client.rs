//! WebSocket client for the job push feed.
//!
//! [`FeedClient`] holds the feed URL. Call [`FeedClient::connect`] to
//! establish a live [`FeedConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Plain or TLS WebSocket stream to the feed.
pub type FeedStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connects to the backend job feed.
pub struct FeedClient {
    feed_url: String,
}

/// A live WebSocket connection to the feed.
pub struct FeedConnection {
    /// Unique client ID sent during the handshake.
    pub client_id: String,
    pub ws_stream: FeedStream,
}

impl FeedClient {
    /// * `feed_url` - WebSocket base URL, e.g. `ws://host:8000`.
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Connect to `{feed_url}/ws?clientId=<uuid>`.
    pub async fn connect(&self) -> Result<FeedConnection, FeedClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws?clientId={}", self.feed_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            FeedClientError::Connection(format!(
                "Failed to connect to job feed at {}: {e}",
                self.feed_url
            ))
        })?;

        tracing::info!(client_id = %client_id, "Connected to job feed at {}", self.feed_url);

        Ok(FeedConnection {
            client_id,
            ws_stream,
        })
    }
}

/// Errors from opening a feed connection.
#[derive(Debug, thiserror::Error)]
pub enum FeedClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
