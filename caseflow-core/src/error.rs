//! # Failure taxonomy
//!
//! Every error enum in this workspace classifies itself into one of the
//! closed kinds below via a `kind()` accessor, and boundaries branch on the
//! kind, never on error type identity. The kinds decide what happens to the
//! record or batch that produced the error:
//!
//! - `ConfigAbsent`: expected lookup miss; the caller decides (usually
//!   "feature disabled", never a retry).
//! - `Transient`: an external call failed for a reason worth retrying; the
//!   record is reported for redelivery.
//! - `NotFoundTerminal`: the target of a delete/cleanup is already gone;
//!   treated as success.
//! - `Malformed`: the record cannot be parsed; attributed to that record
//!   only, never escalated.
//! - `SetupFatal`: a precondition for the whole batch is missing; every
//!   record in the batch is reported as failed.

/// Closed classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Expected configuration lookup miss, non-fatal.
    ConfigAbsent,

    /// External call failed for a retryable reason.
    Transient,

    /// Delete/cleanup target already gone; success, not an error.
    NotFoundTerminal,

    /// Record cannot be parsed; fails that record only.
    Malformed,

    /// Whole-batch precondition missing; fails every record.
    SetupFatal,
}

impl FailureKind {
    /// Stable name for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigAbsent => "config-absent",
            Self::Transient => "transient",
            Self::NotFoundTerminal => "not-found-terminal",
            Self::Malformed => "malformed",
            Self::SetupFatal => "setup-fatal",
        }
    }
}
