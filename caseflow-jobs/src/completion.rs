//! Completion handler.
//!
//! Consumes "job finished" messages from the completion queue and drives the
//! job state machine: success marks the job completed and emits the
//! follow-on index notification where the job type feeds search; failure
//! either schedules a retry (back to pending, attempt incremented) or, once
//! the max-attempts policy is exceeded, parks the job as
//! failed-pending-cleanup for operators.
//!
//! Deletion is never done here; that is the cleanup task's exclusive
//! responsibility.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};

use caseflow_core::{keys, ParamError, ParameterResolver};
use caseflow_index::{ChangeOp, EntityType, IndexNotification};
use caseflow_queue::{QueueRecord, RecordHandler, WorkerError, WorkerResult};

use crate::dispatch::JobDispatcher;
use crate::store::{JobStore, StoreError};
use crate::types::{AttemptResult, CompletionMessage, JobType};

/// Retry ceiling used when no max-attempts parameter is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Batch consumer for the completion queue.
pub struct CompletionConsumer {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<JobDispatcher>,
    params: Arc<ParameterResolver>,
    env: String,
    region: String,
}

impl CompletionConsumer {
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Arc<JobDispatcher>,
        params: Arc<ParameterResolver>,
        env: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            params,
            env: env.into(),
            region: region.into(),
        }
    }

    /// Resolve the retry ceiling. A lookup miss uses the compiled default;
    /// a source failure propagates so the batch can be escalated.
    async fn max_attempts(&self) -> Result<u32, ParamError> {
        let key = keys::max_attempts(&self.env, &self.region);
        match self.params.get_u32(&key).await {
            Ok(value) => Ok(value),
            Err(ParamError::NotConfigured { .. }) => Ok(DEFAULT_MAX_ATTEMPTS),
            Err(err) => Err(err),
        }
    }

    async fn on_success(&self, message: &CompletionMessage) -> WorkerResult<()> {
        match self
            .store
            .complete(
                &message.tenant_id,
                &message.job_id,
                message.attempt_payload.clone(),
            )
            .await
        {
            Ok(()) => {}
            // Redelivery of a completion we already applied. The follow-on
            // notification may still be owed (its publish failure is what
            // triggers redelivery), so fall through and emit it again.
            Err(StoreError::Conflict { .. }) => {
                debug!(
                    tenant_id = %message.tenant_id,
                    job_id = %message.job_id,
                    "job already terminal; re-emitting any follow-on notification"
                );
            }
            // The job record is gone; nothing left to update.
            Err(StoreError::NotFound { .. }) => {
                warn!(
                    tenant_id = %message.tenant_id,
                    job_id = %message.job_id,
                    resource_id = %message.resource_id,
                    "completion for unknown job; ignoring"
                );
                return Ok(());
            }
            Err(err) => {
                return Err(WorkerError::transient(format!(
                    "completing job {}: {err}",
                    message.job_id
                )))
            }
        }

        if message.job_type == JobType::Transcript {
            let notification = IndexNotification {
                tenant_id: message.tenant_id.clone(),
                entity_type: EntityType::Contact,
                op: ChangeOp::Update,
                snapshot: json!({
                    "id": message.resource_id,
                    "transcript_available": true,
                }),
            };
            self.dispatcher
                .publish_index_notification(&notification)
                .await
                .map_err(|err| {
                    WorkerError::transient(format!(
                        "publishing index notification for job {}: {err}",
                        message.job_id
                    ))
                })?;
        }

        Ok(())
    }

    async fn on_failure(&self, message: &CompletionMessage) -> WorkerResult<()> {
        let max_attempts = self.max_attempts().await.map_err(|err| {
            WorkerError::transient(format!("resolving max attempts: {err}"))
        })?;
        let failure = message
            .attempt_payload
            .clone()
            .unwrap_or_else(|| "attempt failed without payload".to_string());

        if message.attempt >= max_attempts {
            match self
                .store
                .fail_pending_cleanup(&message.tenant_id, &message.job_id, failure)
                .await
            {
                Ok(()) => {
                    error!(
                        tenant_id = %message.tenant_id,
                        job_id = %message.job_id,
                        resource_id = %message.resource_id,
                        attempt = message.attempt,
                        max_attempts,
                        "job exhausted retry attempts; parked as failed_pending_cleanup"
                    );
                    Ok(())
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(
                        tenant_id = %message.tenant_id,
                        job_id = %message.job_id,
                        "failure completion for unknown job; ignoring"
                    );
                    Ok(())
                }
                Err(err) => Err(WorkerError::transient(format!(
                    "parking job {}: {err}",
                    message.job_id
                ))),
            }
        } else {
            match self
                .store
                .record_retry(&message.tenant_id, &message.job_id, message.attempt, failure)
                .await
            {
                Ok(next_attempt) => {
                    debug!(
                        tenant_id = %message.tenant_id,
                        job_id = %message.job_id,
                        resource_id = %message.resource_id,
                        attempt = message.attempt,
                        next_attempt,
                        "job attempt failed; pending for retry"
                    );
                    Ok(())
                }
                // Redelivered failure already applied (stale attempt number)
                // or the job has since completed. Either way: no-op.
                Err(StoreError::Conflict { .. }) => {
                    debug!(
                        tenant_id = %message.tenant_id,
                        job_id = %message.job_id,
                        attempt = message.attempt,
                        "failure already resolved; ignoring redelivered record"
                    );
                    Ok(())
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(
                        tenant_id = %message.tenant_id,
                        job_id = %message.job_id,
                        "failure completion for unknown job; ignoring"
                    );
                    Ok(())
                }
                Err(err) => Err(WorkerError::transient(format!(
                    "recording retry for job {}: {err}",
                    message.job_id
                ))),
            }
        }
    }
}

#[async_trait]
impl RecordHandler for CompletionConsumer {
    async fn prepare(&self) -> WorkerResult<()> {
        // The retry decision cannot be made safely without the policy; a
        // source failure (not a mere lookup miss) fails the whole batch.
        self.max_attempts()
            .await
            .map(|_| ())
            .map_err(|err| WorkerError::setup(format!("max-attempts lookup failed: {err}")))
    }

    async fn handle(&self, record: &QueueRecord) -> WorkerResult<()> {
        let message: CompletionMessage = serde_json::from_str(&record.body)
            .map_err(|err| WorkerError::malformed(record.message_id.clone(), err.to_string()))?;

        match message.attempt_result {
            AttemptResult::Success => self.on_success(&message).await,
            AttemptResult::Failure => self.on_failure(&message).await,
        }
    }
}
