//! Push feed message types and parser.
//!
//! The feed sends JSON frames shaped `{"type": "<kind>", "data": {...}}`
//! and accepts `{"action": "subscribe" | "unsubscribe", "node_id": ...}`.

use canvasgen_core::job::JobUpdate;
use canvasgen_core::types::NodeId;
use serde::{Deserialize, Serialize};

/// Messages sent by the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedMessage {
    /// A job changed status.
    #[serde(rename = "job_update")]
    JobUpdate(JobUpdate),

    /// Interest in a node was registered.
    #[serde(rename = "subscribed")]
    Subscribed(SubscribedData),

    /// Keep-alive with no payload.
    #[serde(rename = "heartbeat")]
    Heartbeat(serde_json::Value),
}

/// Payload of a subscription acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedData {
    pub node_id: NodeId,
}

/// Commands sent to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FeedCommand {
    /// Start pushing updates for a node.
    Subscribe { node_id: NodeId },
    /// Stop pushing updates for a node.
    Unsubscribe { node_id: NodeId },
}

/// Parse a raw JSON text frame into a [`FeedMessage`].
pub fn parse_message(text: &str) -> Result<FeedMessage, serde_json::Error> {
    serde_json::from_str(text)
}
