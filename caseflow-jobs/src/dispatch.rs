//! Job dispatcher.
//!
//! Publishes typed job messages to the queue derived from the job type. A
//! queue that is not configured for a job type means the job type is
//! intentionally disabled for this deployment: `publish` succeeds without
//! enqueueing and logs the skip distinctly so it stays auditable. Every
//! other failure is returned to the caller.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use caseflow_core::{keys, FailureKind, ParamError, ParameterResolver, TenantId};
use caseflow_index::IndexNotification;
use caseflow_queue::{QueueTransport, TransportError};

use crate::store::{JobStore, StoreError, StoreResult};
use crate::types::{JobMessage, JobRecord, JobType};

/// Queue-key segment for the index-notification queue. Not a job type;
/// shares the job queue key layout.
const INDEX_QUEUE_SEGMENT: &str = "index";

/// Errors from publishing a job message.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to resolve queue for {job_type}: {source}")]
    Resolve {
        job_type: String,
        #[source]
        source: ParamError,
    },

    #[error("failed to encode message: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to enqueue message: {source}")]
    Enqueue {
        #[source]
        source: TransportError,
    },

    #[error("failed to persist job record: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
}

impl PublishError {
    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Resolve { source, .. } => source.kind(),
            Self::Encode { .. } => FailureKind::Malformed,
            Self::Enqueue { source } => source.kind(),
            Self::Store { source } => source.kind(),
        }
    }
}

/// Publishes job and follow-on messages to their per-type queues.
pub struct JobDispatcher {
    params: Arc<ParameterResolver>,
    transport: Arc<dyn QueueTransport>,
    env: String,
    region: String,
}

impl JobDispatcher {
    pub fn new(
        params: Arc<ParameterResolver>,
        transport: Arc<dyn QueueTransport>,
        env: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            params,
            transport,
            env: env.into(),
            region: region.into(),
        }
    }

    /// Publish one job message for a job record.
    ///
    /// The message carries the record's current attempt number, so the same
    /// entry point serves first dispatch and redispatch after a retry.
    #[instrument(
        skip(self, record),
        fields(
            tenant_id = %record.tenant_id,
            job_id = %record.job_id,
            job_type = record.job_type.as_str(),
            resource_id = %record.resource_id,
            attempt = record.attempt,
        )
    )]
    pub async fn publish(&self, record: &JobRecord) -> Result<(), PublishError> {
        let queue_url = match self.resolve_queue(record.job_type.as_str()).await? {
            Some(url) => url,
            None => {
                info!(
                    disabled = true,
                    "job type has no queue configured for this deployment; skipping dispatch"
                );
                return Ok(());
            }
        };

        let message = JobMessage {
            job_type: record.job_type,
            tenant_id: record.tenant_id.clone(),
            job_id: record.job_id.clone(),
            resource_id: record.resource_id.clone(),
            attempt: record.attempt,
            resource_payload: record.resource_payload.clone(),
            additional_payload: record.additional_payload.clone(),
        };
        let body = serde_json::to_string(&message)?;

        self.transport
            .send(&queue_url, body)
            .await
            .map_err(|source| PublishError::Enqueue { source })?;

        debug!(queue_url, "job message enqueued");
        Ok(())
    }

    /// Publish an entity-change notification to the index queue.
    ///
    /// The index queue follows the same disabled-when-unconfigured rule as
    /// job-type queues.
    #[instrument(
        skip(self, notification),
        fields(
            tenant_id = %notification.tenant_id,
            entity_type = notification.entity_type.as_str(),
        )
    )]
    pub async fn publish_index_notification(
        &self,
        notification: &IndexNotification,
    ) -> Result<(), PublishError> {
        let queue_url = match self.resolve_queue(INDEX_QUEUE_SEGMENT).await? {
            Some(url) => url,
            None => {
                info!(
                    disabled = true,
                    "index queue not configured for this deployment; skipping notification"
                );
                return Ok(());
            }
        };

        let body = serde_json::to_string(notification)?;
        self.transport
            .send(&queue_url, body)
            .await
            .map_err(|source| PublishError::Enqueue { source })?;

        debug!(queue_url, "index notification enqueued");
        Ok(())
    }

    /// Redispatch every pending job for a tenant, e.g. after the completion
    /// handler has scheduled retries.
    ///
    /// Publish failures are surfaced per job via the returned pairs so one
    /// failed dispatch does not block the rest.
    pub async fn redispatch_pending(
        &self,
        store: &dyn JobStore,
        tenant_id: &TenantId,
    ) -> StoreResult<Vec<(JobRecord, Result<(), PublishError>)>> {
        let pending = store.list_pending(tenant_id).await?;
        let mut results = Vec::with_capacity(pending.len());
        for record in pending {
            let outcome = self.publish(&record).await;
            results.push((record, outcome));
        }
        Ok(results)
    }

    /// Resolve the queue URL for a queue-key segment.
    ///
    /// `Ok(None)` is the deliberate not-configured case; real resolution
    /// failures propagate.
    async fn resolve_queue(&self, segment: &str) -> Result<Option<String>, PublishError> {
        let key = keys::job_queue_url(&self.env, &self.region, segment);
        match self.params.get(&key).await {
            Ok(url) => Ok(Some(url)),
            Err(ParamError::NotConfigured { .. }) => Ok(None),
            Err(source) => Err(PublishError::Resolve {
                job_type: segment.to_string(),
                source,
            }),
        }
    }
}

/// Convenience: create a job record, persist it, and dispatch it.
pub async fn create_and_dispatch(
    store: &dyn JobStore,
    dispatcher: &JobDispatcher,
    tenant_id: TenantId,
    job_type: JobType,
    resource_id: &str,
    resource_payload: Value,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<JobRecord, PublishError> {
    let record = JobRecord::new(tenant_id, job_type, resource_id, resource_payload, now);
    store
        .create(record.clone())
        .await
        .map_err(|source| PublishError::Store { source })?;
    dispatcher.publish(&record).await?;
    Ok(record)
}
