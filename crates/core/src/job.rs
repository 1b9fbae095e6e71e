//! Wire types shared with the generation backend.

use serde::{Deserialize, Serialize};

use crate::node::NodeKind;
use crate::parameters::ParamMap;
use crate::types::NodeId;

/// Backend job status as reported by both the push feed and the status
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// A terminal job never changes again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Observation of a backend job, keyed by the node that requested it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub node_id: NodeId,
    /// Only terminal statuses change the node.
    pub status: JobStatus,
    /// Media location. Only meaningful with [`JobStatus::Completed`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl JobUpdate {
    /// Completed job with its media URL.
    pub fn completed(node_id: impl Into<NodeId>, url: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: JobStatus::Completed,
            result_url: Some(url.into()),
        }
    }

    /// Failed job.
    pub fn failed(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            status: JobStatus::Failed,
            result_url: None,
        }
    }
}

/// Snapshot of a node taken at dispatch time. The in-flight job only ever
/// sees these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Correlation key; every job update carries it back.
    pub node_id: NodeId,
    pub prompt: String,
    pub model_id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub parameters: ParamMap,
    /// Reference URLs in submission order. The backend is order-sensitive.
    pub references: Vec<String>,
}

/// Backend acknowledgement of a submit call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// `false` when the backend refused the job outright.
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Reason given for a refusal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
