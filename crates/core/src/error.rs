use crate::types::NodeId;

/// Domain errors raised by the canvas state machine and its collaborators.
///
/// Every variant is recoverable at the boundary where it occurs. Only
/// [`CoreError::DispatchFailure`] implies a state change (the node moved to
/// `Failed`); all others leave the canvas untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// Another node on the canvas is already generating.
    #[error("Node {requested} cannot start generating: node {active} is already generating")]
    ConcurrencyViolation { requested: NodeId, active: NodeId },

    /// The run lacks something it needs, such as a model.
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// The credit balance does not cover the model's cost.
    #[error("Insufficient credit: {required} required, {available} available")]
    InsufficientCredit { required: u32, available: u32 },

    /// The backend refused or never acknowledged the job.
    #[error("Dispatch failed: {0}")]
    DispatchFailure(String),

    /// The node does not exist, or was deleted meanwhile.
    #[error("Node {0} not found")]
    StaleNodeReference(NodeId),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A collaborator service failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The canvas store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConcurrencyViolation { .. } => "CONCURRENCY_VIOLATION",
            CoreError::MissingPrerequisite(_) => "MISSING_PREREQUISITE",
            CoreError::InsufficientCredit { .. } => "INSUFFICIENT_CREDIT",
            CoreError::DispatchFailure(_) => "DISPATCH_FAILURE",
            CoreError::StaleNodeReference(_) => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Upstream(_) => "UPSTREAM_ERROR",
            CoreError::Storage(_) => "STORAGE_ERROR",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_message_names_both_nodes() {
        let err = CoreError::ConcurrencyViolation {
            requested: "node:b".into(),
            active: "node:a".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("node:b"));
        assert!(msg.contains("node:a"));
        assert_eq!(err.code(), "CONCURRENCY_VIOLATION");
    }

    #[test]
    fn stale_reference_maps_to_not_found() {
        assert_eq!(
            CoreError::StaleNodeReference("node:x".into()).code(),
            "NOT_FOUND"
        );
    }
}
