use caseflow_core::FailureKind;
use thiserror::Error;

/// Result type for record handlers.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Failure of a single record, or of a whole batch's setup.
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    /// The record body could not be parsed. Fails that record only.
    #[error("malformed record {message_id}: {message}")]
    Malformed { message_id: String, message: String },

    /// An external call failed for a retryable reason.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// A whole-batch precondition is missing. Fails every record.
    #[error("batch setup failed: {message}")]
    Setup { message: String },
}

impl WorkerError {
    /// Create a malformed-record error.
    pub fn malformed<I: Into<String>, M: Into<String>>(message_id: I, message: M) -> Self {
        Self::Malformed {
            message_id: message_id.into(),
            message: message.into(),
        }
    }

    /// Create a transient error.
    pub fn transient<M: Into<String>>(message: M) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a setup-fatal error.
    pub fn setup<M: Into<String>>(message: M) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Malformed { .. } => FailureKind::Malformed,
            Self::Transient { .. } => FailureKind::Transient,
            Self::Setup { .. } => FailureKind::SetupFatal,
        }
    }
}
