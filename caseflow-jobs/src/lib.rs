//! caseflow-jobs: the contact post-processing state machine.
//!
//! When a contact reaches a trigger state the dispatcher publishes a typed
//! job message to the queue derived from the job type; workers report back
//! on a completion queue; the completion handler drives retries; and the
//! cleanup task eventually tears down external artifacts and removes the
//! record. Jobs live in the [`store::JobStore`] with monotonic status
//! transitions and are never deleted while external teardown is
//! unconfirmed.

pub mod channels;
pub mod cleanup;
pub mod completion;
pub mod dispatch;
pub mod store;
pub mod types;

pub use channels::{ChannelError, ChannelResult, ConversationChannels, MemoryChannels};
pub use cleanup::{CleanupConfig, CleanupReport, CleanupTask};
pub use completion::{CompletionConsumer, DEFAULT_MAX_ATTEMPTS};
pub use dispatch::{create_and_dispatch, JobDispatcher, PublishError};
pub use store::{JobStore, MemoryJobStore, StoreError, StoreResult};
pub use types::{
    AttemptResult, CompletionMessage, JobId, JobMessage, JobRecord, JobStatus, JobType,
};
