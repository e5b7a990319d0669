use serde::{Deserialize, Serialize};
use serde_json::Value;

use caseflow_core::TenantId;

use super::{JobId, JobType};

/// Message a producer enqueues onto a job-type queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_type: JobType,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub resource_id: String,

    /// Attempt number this dispatch represents (1-indexed).
    pub attempt: u32,

    /// Job-type-specific context carried to the worker.
    pub resource_payload: Value,

    /// Optional hints set by a later stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_payload: Option<Value>,
}

/// Outcome of one job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptResult {
    Success,
    Failure,
}

/// Message a worker enqueues onto the completion queue after an attempt.
///
/// Carries the original job fields so the completion handler never needs the
/// original dispatch payload to reconstruct the failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub job_type: JobType,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub resource_id: String,
    pub attempt: u32,
    pub attempt_result: AttemptResult,

    /// Opaque result on success, error text on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_payload: Option<String>,
}
