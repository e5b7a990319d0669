pub mod ids;
pub mod message;
pub mod record;

pub use ids::JobId;
pub use message::{AttemptResult, CompletionMessage, JobMessage};
pub use record::{JobRecord, JobStatus, JobType};
