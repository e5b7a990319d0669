//! Job record store.
//!
//! The durable state of jobs behind a narrow capability trait. Status
//! transitions are validated here: an illegal transition is a [`StoreError::Conflict`],
//! which callers use to detect redelivered work (complete-after-complete)
//! and to enforce the no-premature-deletion invariant (a
//! `failed_pending_cleanup` job refuses deletion).

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use caseflow_core::{FailureKind, TenantId};

use crate::types::{JobId, JobRecord};

pub use memory::MemoryJobStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the job record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("job not found: {job_id} (tenant {tenant_id})")]
    NotFound { tenant_id: TenantId, job_id: JobId },

    #[error("illegal transition for job {job_id}: {message}")]
    Conflict { job_id: JobId, message: String },

    #[error("store backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(tenant_id: &TenantId, job_id: &JobId) -> Self {
        Self::NotFound {
            tenant_id: tenant_id.clone(),
            job_id: job_id.clone(),
        }
    }

    /// Create a conflict error.
    pub fn conflict<M: Into<String>>(job_id: &JobId, message: M) -> Self {
        Self::Conflict {
            job_id: job_id.clone(),
            message: message.into(),
        }
    }

    /// Create a backend error.
    pub fn backend<M: Into<String>>(message: M) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFoundTerminal,
            Self::Conflict { .. } => FailureKind::Malformed,
            Self::Backend { .. } => FailureKind::Transient,
        }
    }
}

/// Capability trait over durable job state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job record.
    async fn create(&self, record: JobRecord) -> StoreResult<()>;

    /// Fetch a job record.
    async fn get(&self, tenant_id: &TenantId, job_id: &JobId) -> StoreResult<JobRecord>;

    /// Pending → active; stamps `last_attempt_at`.
    async fn mark_active(&self, tenant_id: &TenantId, job_id: &JobId) -> StoreResult<()>;

    /// Record a failed attempt: back to pending with an incremented attempt
    /// counter and the failure text stored. Returns the new attempt number.
    ///
    /// `attempt` names the attempt being resolved; a mismatch with the
    /// stored counter is a `Conflict`, so a redelivered failure cannot
    /// consume retry budget twice.
    async fn record_retry(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        attempt: u32,
        error: String,
    ) -> StoreResult<u32>;

    /// Mark the job completed and store the result payload. Completing an
    /// already-terminal job is a `Conflict`.
    async fn complete(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        payload: Option<String>,
    ) -> StoreResult<()>;

    /// Park the job as failed-pending-cleanup with a reason.
    async fn fail_pending_cleanup(
        &self,
        tenant_id: &TenantId,
        job_id: &JobId,
        reason: String,
    ) -> StoreResult<()>;

    /// Delete a job record. Deleting a failed-pending-cleanup job is a
    /// `Conflict`: those are parked for operators, never silently dropped.
    async fn delete(&self, tenant_id: &TenantId, job_id: &JobId) -> StoreResult<()>;

    /// All pending jobs for a tenant, oldest first.
    async fn list_pending(&self, tenant_id: &TenantId) -> StoreResult<Vec<JobRecord>>;

    /// Tenants that currently have completed jobs awaiting cleanup.
    async fn tenants_with_cleanup_candidates(&self) -> StoreResult<Vec<TenantId>>;

    /// Completed jobs created before the cutoff, oldest first.
    async fn list_cleanup_candidates(
        &self,
        tenant_id: &TenantId,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<JobRecord>>;
}
