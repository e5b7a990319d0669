use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use caseflow_core::TenantId;

use super::JobId;

/// Closed enumeration of post-processing job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Fetch the conversation transcript for a contact and store it durably.
    Transcript,

    /// Fetch the call recording URL for a contact.
    Recording,
}

impl JobType {
    /// Stable name, also the segment used in parameter-store queue keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Recording => "recording",
        }
    }

    /// Whether this job type provisions a third-party conversation channel
    /// that cleanup must tear down.
    pub fn provisions_channel(&self) -> bool {
        matches!(self, Self::Transcript)
    }

    /// Object-storage key of the durable artifact this job type produces,
    /// if it produces one.
    pub fn artifact_key(&self, tenant: &TenantId, resource_id: &str) -> Option<String> {
        match self {
            Self::Transcript => Some(format!("{tenant}/transcripts/{resource_id}.json")),
            Self::Recording => None,
        }
    }
}

/// Job status lifecycle.
///
/// Transitions are monotonic within an attempt: pending → active →
/// completed | failed-pending-cleanup. A retry starts a new attempt by
/// moving the job back to pending with an incremented attempt counter,
/// never by mutating a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be dispatched or retried.
    Pending,

    /// An attempt is in flight.
    Active,

    /// Finished successfully; eligible for cleanup after retention.
    Completed,

    /// Retries exhausted or external teardown unconfirmed. Never deleted.
    FailedPendingCleanup,
}

impl JobStatus {
    /// Get the status name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::FailedPendingCleanup => "failed_pending_cleanup",
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::FailedPendingCleanup)
    }
}

/// Durable state of one unit of post-processing work for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier, scoped to the tenant.
    pub job_id: JobId,

    /// Tenant owning the job.
    pub tenant_id: TenantId,

    /// What kind of work this job performs.
    pub job_type: JobType,

    /// The owning entity, e.g. a contact ID. The job survives deletion of
    /// that entity until cleanup handles the orphan.
    pub resource_id: String,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Attempt counter, monotonic, starts at 1.
    pub attempt: u32,

    /// When the last attempt was started or resolved.
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// Job-type-specific context, e.g. provider channel identifiers.
    pub resource_payload: Value,

    /// Optional hints set by a later stage, e.g. a precomputed related
    /// record id.
    pub additional_payload: Option<Value>,

    /// Opaque result or error text from the latest attempt.
    pub completion_payload: Option<String>,

    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh pending job at attempt 1.
    pub fn new(
        tenant_id: TenantId,
        job_type: JobType,
        resource_id: impl Into<String>,
        resource_payload: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            tenant_id,
            job_type,
            resource_id: resource_id.into(),
            status: JobStatus::Pending,
            attempt: 1,
            last_attempt_at: None,
            resource_payload,
            additional_payload: None,
            completion_payload: None,
            created_at: now,
        }
    }

    /// The provider channel this job provisioned, if its payload carries one.
    pub fn channel_id(&self) -> Option<&str> {
        self.resource_payload.get("channel_id").and_then(Value::as_str)
    }

    /// Object-storage key of this job's durable artifact, if any.
    pub fn artifact_key(&self) -> Option<String> {
        self.job_type.artifact_key(&self.tenant_id, &self.resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_jobs_own_a_channel_and_an_artifact() {
        assert!(JobType::Transcript.provisions_channel());
        assert_eq!(
            JobType::Transcript.artifact_key(&TenantId::new("t1"), "contact-9"),
            Some("t1/transcripts/contact-9.json".to_string())
        );
    }

    #[test]
    fn recording_jobs_have_no_external_artifact() {
        assert!(!JobType::Recording.provisions_channel());
        assert_eq!(
            JobType::Recording.artifact_key(&TenantId::new("t1"), "contact-9"),
            None
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Active.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::FailedPendingCleanup.is_terminal());
    }
}
