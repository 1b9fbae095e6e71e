//! Generation dispatcher.
//!
//! Validates a run, moves the node to `Generating`, registers it for
//! reconciliation and submits the job. A single attempt is made; the
//! result arrives later through the reconciliation channel.
//!
//! Submission runs on its own task under a deadline. The node always
//! leaves `Generating` on a failed submit, even when the caller that
//! started the run has gone away.

use std::sync::{Arc, Weak};
use std::time::Duration;

use canvasgen_core::backend::{CreditLedger, GenerationBackend};
use canvasgen_core::canvas::GenerationRequest;
use canvasgen_core::error::CoreError;
use canvasgen_core::job::{SubmitAck, SubmitRequest};
use canvasgen_core::types::NodeId;

use crate::reconcile::{ReconciliationChannel, ResultSink};
use crate::session::CanvasSession;

/// Starts generations under the single-flight rule.
pub struct Dispatcher {
    backend: Arc<dyn GenerationBackend>,
    ledger: Arc<dyn CreditLedger>,
    reconciler: Arc<ReconciliationChannel>,
    /// Longest wait for the backend to acknowledge a submission.
    submit_timeout: Duration,
}

impl Dispatcher {
    /// `submit_timeout` bounds each backend submit call.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        ledger: Arc<dyn CreditLedger>,
        reconciler: Arc<ReconciliationChannel>,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            ledger,
            reconciler,
            submit_timeout,
        }
    }

    /// Dispatch `node_id`. Without a `request` the node's stored prompt,
    /// model and parameters are used.
    ///
    /// Every rejection before submission leaves the canvas untouched. A
    /// failed submission moves the node to `Failed` and returns
    /// [`CoreError::DispatchFailure`].
    pub async fn dispatch(
        &self,
        session: &Arc<CanvasSession>,
        node_id: &str,
        request: Option<GenerationRequest>,
    ) -> Result<SubmitAck, CoreError> {
        let node = session
            .node(node_id)
            .await
            .ok_or_else(|| CoreError::StaleNodeReference(node_id.to_string()))?;

        if let Some(active) = session.generating_node().await {
            return Err(CoreError::ConcurrencyViolation {
                requested: node_id.to_string(),
                active,
            });
        }

        let request = request.unwrap_or_else(|| GenerationRequest::from_node(&node));
        if request.model_id.trim().is_empty() {
            return Err(CoreError::MissingPrerequisite("no model selected".into()));
        }
        let cost = session
            .catalog()
            .find_for(node.kind, &request.model_id)
            .map(|m| m.cost_per_run)
            .ok_or_else(|| {
                CoreError::MissingPrerequisite(format!(
                    "model '{}' is not available for {} nodes",
                    request.model_id,
                    node.kind.as_str()
                ))
            })?;

        self.check_credit(node_id, cost).await?;

        let submit = session.start_generation(node_id, request).await?;
        let sink: Arc<dyn ResultSink> = Arc::clone(session) as Arc<dyn ResultSink>;
        let sink: Weak<dyn ResultSink> = Arc::downgrade(&sink);
        self.reconciler.track(node_id, sink).await;

        tracing::info!(
            canvas_id = %session.id(),
            node_id,
            model_id = %submit.model_id,
            references = submit.references.len(),
            "Submitting generation",
        );

        let submission = tokio::spawn(submit_and_settle(
            Arc::clone(&self.backend),
            Arc::clone(&self.reconciler),
            Arc::clone(session),
            node_id.to_string(),
            submit,
            self.submit_timeout,
        ));
        submission
            .await
            .map_err(|e| CoreError::DispatchFailure(format!("submission task failed: {e}")))?
    }

    /// Reject when the balance cannot cover `cost`. An unreachable ledger
    /// lets the run through; the backend bills authoritatively.
    async fn check_credit(&self, node_id: &str, cost: u32) -> Result<(), CoreError> {
        match self.ledger.balance().await {
            Ok(available) if available < cost => Err(CoreError::InsufficientCredit {
                required: cost,
                available,
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(node_id, error = %e, "Credit check unavailable, dispatching anyway");
                Ok(())
            }
        }
    }
}

/// Submit one job and, unless the backend accepts it in time, release
/// tracking and move the node to `Failed`.
async fn submit_and_settle(
    backend: Arc<dyn GenerationBackend>,
    reconciler: Arc<ReconciliationChannel>,
    session: Arc<CanvasSession>,
    node_id: NodeId,
    submit: SubmitRequest,
    deadline: Duration,
) -> Result<SubmitAck, CoreError> {
    let failure = match tokio::time::timeout(deadline, backend.submit(&submit)).await {
        Ok(Ok(ack)) if ack.accepted => {
            tracing::info!(%node_id, generation_id = ?ack.generation_id, "Generation accepted");
            return Ok(ack);
        }
        Ok(Ok(ack)) => ack
            .detail
            .unwrap_or_else(|| "generation rejected by backend".to_string()),
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("backend did not answer within {}s", deadline.as_secs()),
    };

    tracing::error!(%node_id, error = %failure, "Generation dispatch failed");
    reconciler.untrack(&node_id);
    session.mark_failed(&node_id).await;
    Err(CoreError::DispatchFailure(failure))
}
