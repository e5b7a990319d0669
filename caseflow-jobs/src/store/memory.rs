use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use caseflow_core::{Clock, TenantId};

use crate::types::{JobId, JobRecord, JobStatus};

use super::{JobStore, StoreError, StoreResult};

type TenantJobs = HashMap<TenantId, HashMap<JobId, JobRecord>>;

/// In-memory job store for tests and development.
///
/// Tenant-partitioned maps behind a single lock; the clock is injected so
/// tests can age jobs past retention windows deterministically.
pub struct MemoryJobStore {
    jobs: RwLock<TenantJobs>,
    clock: Arc<dyn Clock>,
}

impl MemoryJobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of records currently stored for a tenant.
    pub fn count(&self, tenant_id: &TenantId) -> usize {
        self.jobs
            .read()
            .get(tenant_id)
            .map(|jobs| jobs.len())
            .unwrap_or(0)
    }

    fn with_job<T>(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        f: impl FnOnce(&mut JobRecord) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(tenant_id)
            .and_then(|tenant| tenant.get_mut(job_id))
            .ok_or_else(|| StoreError::not_found(tenant_id, job_id))?;
        f(record)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: JobRecord) -> StoreResult<()> {
        let mut jobs = self.jobs.write();
        let tenant = jobs.entry(record.tenant_id.clone()).or_default();
        if tenant.contains_key(&record.job_id) {
            return Err(StoreError::conflict(&record.job_id, "job already exists"));
        }
        tenant.insert(record.job_id.clone(), record);
        Ok(())
    }

    async fn get(&self, tenant_id: &TenantId, job_id: &JobId) -> StoreResult<JobRecord> {
        self.jobs
            .read()
            .get(tenant_id)
            .and_then(|tenant| tenant.get(job_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(tenant_id, job_id))
    }

    async fn mark_active(&self, tenant_id: &TenantId, job_id: &JobId) -> StoreResult<()> {
        let now = self.clock.now();
        self.with_job(tenant_id, job_id, |record| match record.status {
            JobStatus::Pending => {
                record.status = JobStatus::Active;
                record.last_attempt_at = Some(now);
                Ok(())
            }
            status => Err(StoreError::conflict(
                job_id,
                format!("cannot activate a {} job", status.name()),
            )),
        })
    }

    async fn record_retry(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        attempt: u32,
        error: String,
    ) -> StoreResult<u32> {
        let now = self.clock.now();
        self.with_job(tenant_id, job_id, |record| match record.status {
            JobStatus::Pending | JobStatus::Active => {
                if record.attempt != attempt {
                    return Err(StoreError::conflict(
                        job_id,
                        format!(
                            "attempt {attempt} already resolved (current attempt {})",
                            record.attempt
                        ),
                    ));
                }
                record.status = JobStatus::Pending;
                record.attempt += 1;
                record.last_attempt_at = Some(now);
                record.completion_payload = Some(error);
                Ok(record.attempt)
            }
            status => Err(StoreError::conflict(
                job_id,
                format!("cannot retry a {} job", status.name()),
            )),
        })
    }

    async fn complete(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        payload: Option<String>,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        self.with_job(tenant_id, job_id, |record| {
            if record.status.is_terminal() {
                return Err(StoreError::conflict(
                    job_id,
                    format!("cannot complete a {} job", record.status.name()),
                ));
            }
            record.status = JobStatus::Completed;
            record.last_attempt_at = Some(now);
            record.completion_payload = payload;
            Ok(())
        })
    }

    async fn fail_pending_cleanup(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        reason: String,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        self.with_job(tenant_id, job_id, |record| {
            record.status = JobStatus::FailedPendingCleanup;
            record.last_attempt_at = Some(now);
            record.completion_payload = Some(reason);
            Ok(())
        })
    }

    async fn delete(&self, tenant_id: &TenantId, job_id: &JobId) -> StoreResult<()> {
        let mut jobs = self.jobs.write();
        let tenant = jobs
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::not_found(tenant_id, job_id))?;
        let record = tenant
            .get(job_id)
            .ok_or_else(|| StoreError::not_found(tenant_id, job_id))?;
        if record.status == JobStatus::FailedPendingCleanup {
            return Err(StoreError::conflict(
                job_id,
                "job is parked as failed_pending_cleanup",
            ));
        }
        tenant.remove(job_id);
        Ok(())
    }

    async fn list_pending(&self, tenant_id: &TenantId) -> StoreResult<Vec<JobRecord>> {
        let mut pending: Vec<JobRecord> = self
            .jobs
            .read()
            .get(tenant_id)
            .map(|tenant| {
                tenant
                    .values()
                    .filter(|record| record.status == JobStatus::Pending)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        pending.sort_by_key(|record| record.created_at);
        Ok(pending)
    }

    async fn tenants_with_cleanup_candidates(&self) -> StoreResult<Vec<TenantId>> {
        let mut tenants: Vec<TenantId> = self
            .jobs
            .read()
            .iter()
            .filter(|(_, jobs)| {
                jobs.values()
                    .any(|record| record.status == JobStatus::Completed)
            })
            .map(|(tenant, _)| tenant.clone())
            .collect();
        tenants.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(tenants)
    }

    async fn list_cleanup_candidates(
        &self,
        tenant_id: &TenantId,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<JobRecord>> {
        let mut candidates: Vec<JobRecord> = self
            .jobs
            .read()
            .get(tenant_id)
            .map(|tenant| {
                tenant
                    .values()
                    .filter(|record| {
                        record.status == JobStatus::Completed && record.created_at < cutoff
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        candidates.sort_by_key(|record| record.created_at);
        Ok(candidates)
    }
}
