//! Cleanup task.
//!
//! Scheduled sweep over completed jobs past their retention window, tenant
//! by tenant. For artifact-bearing job types the external side effects are
//! torn down in a strict order before the record is touched:
//!
//! 1. confirm the durable artifact actually exists in object storage;
//! 2. delete the provider conversation channel ("already gone" counts as
//!    done);
//! 3. only then delete the job record.
//!
//! Any step that cannot be confirmed parks the job as
//! failed-pending-cleanup and moves on; parked jobs are never deleted. One
//! job's failure never aborts the rest of the sweep, and a deadline guard
//! bounds the total run.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{debug, info, warn};

use caseflow_core::{keys, Clock, ObjectStore, ParamError, ParameterResolver, StorageError, TenantId};

use crate::channels::{ChannelError, ConversationChannels};
use crate::store::{JobStore, StoreResult};
use crate::types::JobRecord;

/// Retention and run-budget policy for the cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Retention window applied when a tenant has no override, in days.
    pub default_retention_days: u32,

    /// Hard ceiling: no override can extend retention past this, in days.
    pub max_retention_days: u32,

    /// Total run budget; past this no new job is started.
    pub deadline: StdDuration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            default_retention_days: 30,
            max_retention_days: 90,
            deadline: StdDuration::from_secs(240),
        }
    }
}

/// What the sweep did, for operator logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Job records removed after confirmed (or already-absent) teardown.
    pub deleted: usize,

    /// Jobs parked as failed-pending-cleanup this run.
    pub quarantined: usize,

    /// Jobs whose record deletion failed; retried next run.
    pub failed: usize,

    /// Jobs left untouched because the deadline expired.
    pub skipped_deadline: usize,

    /// Tenants the sweep never reached before the deadline.
    pub skipped_tenants: usize,
}

enum JobOutcome {
    Deleted,
    Quarantined,
    Failed,
}

/// The scheduled cleanup sweep.
pub struct CleanupTask {
    store: Arc<dyn JobStore>,
    params: Arc<ParameterResolver>,
    channels: Arc<dyn ConversationChannels>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    env: String,
    config: CleanupConfig,
}

impl CleanupTask {
    pub fn new(
        store: Arc<dyn JobStore>,
        params: Arc<ParameterResolver>,
        channels: Arc<dyn ConversationChannels>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        env: impl Into<String>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            store,
            params,
            channels,
            objects,
            clock,
            env: env.into(),
            config,
        }
    }

    /// Run one sweep across all tenants with cleanup candidates.
    pub async fn run(&self) -> StoreResult<CleanupReport> {
        let started = self.clock.now();
        let deadline = started
            + Duration::from_std(self.config.deadline).unwrap_or_else(|_| Duration::seconds(240));

        let tenants = self.store.tenants_with_cleanup_candidates().await?;
        let mut report = CleanupReport::default();

        'tenants: for (visited, tenant_id) in tenants.iter().enumerate() {
            let retention_days = self.effective_retention_days(tenant_id).await;
            let cutoff = self.clock.now() - Duration::days(i64::from(retention_days));

            let candidates = match self.store.list_cleanup_candidates(tenant_id, cutoff).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(
                        tenant_id = %tenant_id,
                        error = %err,
                        "failed to list cleanup candidates; skipping tenant"
                    );
                    continue;
                }
            };

            for (position, job) in candidates.iter().enumerate() {
                if self.clock.now() >= deadline {
                    report.skipped_deadline += candidates.len() - position;
                    report.skipped_tenants = tenants.len() - visited - 1;
                    info!(
                        tenant_id = %tenant_id,
                        skipped = report.skipped_deadline,
                        tenants_unvisited = report.skipped_tenants,
                        "cleanup deadline reached; leaving remaining work for the next run"
                    );
                    break 'tenants;
                }

                match self.cleanup_job(job).await {
                    JobOutcome::Deleted => report.deleted += 1,
                    JobOutcome::Quarantined => report.quarantined += 1,
                    JobOutcome::Failed => report.failed += 1,
                }
            }
        }

        info!(
            deleted = report.deleted,
            quarantined = report.quarantined,
            failed = report.failed,
            skipped_deadline = report.skipped_deadline,
            skipped_tenants = report.skipped_tenants,
            "cleanup sweep finished"
        );
        Ok(report)
    }

    /// Effective retention: `min(system maximum, tenant override)`, with the
    /// system default when no override is configured. An override can never
    /// extend retention beyond the ceiling.
    async fn effective_retention_days(&self, tenant_id: &TenantId) -> u32 {
        let key = keys::retention_days(&self.env, tenant_id);
        let requested = match self.params.get_u32(&key).await {
            Ok(days) => days,
            Err(ParamError::NotConfigured { .. }) => self.config.default_retention_days,
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    error = %err,
                    "retention override lookup failed; using system default"
                );
                self.config.default_retention_days
            }
        };
        requested.min(self.config.max_retention_days)
    }

    /// Tear down one job. Never propagates; every failure path resolves to
    /// an outcome so the sweep continues.
    async fn cleanup_job(&self, job: &JobRecord) -> JobOutcome {
        if job.job_type.provisions_channel() {
            if !self.confirm_artifact(job).await {
                return self.quarantine(job, "artifact not confirmed in object storage").await;
            }
            match self.teardown_channel(job).await {
                Ok(()) => {}
                Err(reason) => return self.quarantine(job, &reason).await,
            }
        }

        match self.store.delete(&job.tenant_id, &job.job_id).await {
            Ok(()) => {
                debug!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.job_id,
                    resource_id = %job.resource_id,
                    "job record deleted"
                );
                JobOutcome::Deleted
            }
            Err(err) => {
                warn!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.job_id,
                    error = %err,
                    "failed to delete job record; will retry next sweep"
                );
                JobOutcome::Failed
            }
        }
    }

    /// Whether the job's durable artifact is confirmed present.
    async fn confirm_artifact(&self, job: &JobRecord) -> bool {
        let Some(artifact_key) = job.artifact_key() else {
            return false;
        };
        match self.objects.head(&artifact_key).await {
            Ok(_) => true,
            Err(StorageError::NotFound { .. }) => {
                warn!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.job_id,
                    artifact_key,
                    "expected artifact missing; refusing channel teardown"
                );
                false
            }
            Err(err) => {
                warn!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.job_id,
                    artifact_key,
                    error = %err,
                    "could not confirm artifact; refusing channel teardown"
                );
                false
            }
        }
    }

    /// Delete the provider channel. "Already gone" is success.
    async fn teardown_channel(&self, job: &JobRecord) -> Result<(), String> {
        let Some(channel_id) = job.channel_id() else {
            return Err("job payload carries no channel id".to_string());
        };

        match self.channels.delete_channel(&job.tenant_id, channel_id).await {
            Ok(()) => Ok(()),
            Err(ChannelError::NotFound { .. }) => {
                debug!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.job_id,
                    channel_id,
                    "channel already deleted; treating as success"
                );
                Ok(())
            }
            Err(err) => Err(format!("channel teardown failed: {err}")),
        }
    }

    /// Park a job as failed-pending-cleanup and report the outcome.
    async fn quarantine(&self, job: &JobRecord, reason: &str) -> JobOutcome {
        warn!(
            tenant_id = %job.tenant_id,
            job_id = %job.job_id,
            resource_id = %job.resource_id,
            attempt = job.attempt,
            reason,
            "parking job as failed_pending_cleanup"
        );
        if let Err(err) = self
            .store
            .fail_pending_cleanup(&job.tenant_id, &job.job_id, reason.to_string())
            .await
        {
            warn!(
                tenant_id = %job.tenant_id,
                job_id = %job.job_id,
                error = %err,
                "failed to park job; will retry next sweep"
            );
            return JobOutcome::Failed;
        }
        JobOutcome::Quarantined
    }
}
