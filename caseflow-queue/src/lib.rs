//! caseflow-queue: the execution discipline every pipeline consumer shares.
//!
//! A consumer receives a batch of opaque queue records, processes each one
//! in its own failure boundary, and returns only the identifiers of the
//! records that must be redelivered. Records absent from the report are
//! permanently acknowledged, so every handler must be idempotent under
//! at-least-once delivery.
//!
//! The crate also carries the outbound [`QueueTransport`] capability used
//! by producers; the queue infrastructure itself (redelivery timing,
//! backoff) is an external collaborator.

pub mod batch;
pub mod error;
pub mod transport;

pub use batch::{run_isolated, BatchFailures, BatchProcessor, QueueRecord, RecordHandler};
pub use error::{WorkerError, WorkerResult};
pub use transport::{MemoryTransport, QueueTransport, TransportError, TransportResult};
