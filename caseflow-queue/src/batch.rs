//! # Batch-worker contract
//!
//! The delivery contract with the queue infrastructure: a consumer is handed
//! an ordered batch of records, acknowledges the whole batch, and names the
//! subset that must be redelivered. [`BatchFailures`] is that subset, always
//! by message identifier, never by content.
//!
//! Two failure disciplines apply:
//! - a record that fails is reported alone; the rest of the batch proceeds;
//! - a setup precondition that fails before any record is touched escalates
//!   to the whole batch, because no record could have been processed
//!   correctly.

use async_trait::async_trait;
use futures::future;
use tracing::{error, warn};

use crate::error::WorkerResult;

/// One opaque record as delivered by the queue.
#[derive(Debug, Clone)]
pub struct QueueRecord {
    /// Identifier used for redelivery reporting.
    pub message_id: String,

    /// Raw message body.
    pub body: String,
}

impl QueueRecord {
    pub fn new<I: Into<String>, B: Into<String>>(message_id: I, body: B) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
        }
    }
}

/// The identifiers a consumer reports back for redelivery.
///
/// Ordered, deduplicated. A record absent from this report is considered
/// permanently processed and must never be redelivered by the caller.
#[derive(Debug, Clone, Default)]
pub struct BatchFailures {
    failed: Vec<String>,
}

impl BatchFailures {
    /// An empty report: every record succeeded.
    pub fn none() -> Self {
        Self::default()
    }

    /// Report every record in the batch as failed.
    pub fn fail_all(records: &[QueueRecord]) -> Self {
        let mut failures = Self::default();
        for record in records {
            failures.fail(record.message_id.clone());
        }
        failures
    }

    /// Add one failed identifier. Duplicates are ignored.
    pub fn fail(&mut self, message_id: String) {
        if !self.failed.contains(&message_id) {
            self.failed.push(message_id);
        }
    }

    /// Add many failed identifiers.
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, message_ids: I) {
        for id in message_ids {
            self.fail(id);
        }
    }

    /// The failed identifiers, in first-failure order.
    pub fn ids(&self) -> &[String] {
        &self.failed
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.failed.iter().any(|id| id == message_id)
    }

    pub fn len(&self) -> usize {
        self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Contract implemented by every consumer in the pipeline.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    /// Process a batch and report the identifiers to redeliver.
    ///
    /// Must never report an identifier that was not in the input batch.
    async fn process_batch(&self, records: Vec<QueueRecord>) -> BatchFailures;
}

/// Per-record handler for consumers whose records are independent.
///
/// Consumers that need cross-record grouping (the index consumer) implement
/// [`BatchProcessor`] directly instead.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Batch-wide precondition check, run once before any record.
    ///
    /// A failure here fails the entire batch without touching a record.
    async fn prepare(&self) -> WorkerResult<()> {
        Ok(())
    }

    /// Process one record. Must be idempotent: redelivery can replay a
    /// record the consumer already succeeded on.
    async fn handle(&self, record: &QueueRecord) -> WorkerResult<()>;
}

/// Run a [`RecordHandler`] over a batch with isolated failure boundaries.
///
/// Records are processed concurrently; one record's failure never prevents
/// the others from being attempted, and no cross-record ordering is
/// guaranteed.
pub async fn run_isolated<H: RecordHandler>(handler: &H, records: &[QueueRecord]) -> BatchFailures {
    if let Err(err) = handler.prepare().await {
        error!(
            kind = err.kind().as_str(),
            error = %err,
            batch_size = records.len(),
            "batch setup failed; reporting every record for redelivery"
        );
        return BatchFailures::fail_all(records);
    }

    let outcomes = future::join_all(records.iter().map(|record| async move {
        match handler.handle(record).await {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    message_id = %record.message_id,
                    kind = err.kind().as_str(),
                    error = %err,
                    "record failed; scheduling redelivery"
                );
                Some(record.message_id.clone())
            }
        }
    }))
    .await;

    let mut failures = BatchFailures::none();
    failures.extend(outcomes.into_iter().flatten());
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_all_preserves_batch_order() {
        let records = vec![
            QueueRecord::new("m-1", "{}"),
            QueueRecord::new("m-2", "{}"),
            QueueRecord::new("m-3", "{}"),
        ];
        let failures = BatchFailures::fail_all(&records);
        assert_eq!(failures.ids(), ["m-1", "m-2", "m-3"]);
    }

    #[test]
    fn duplicate_identifiers_collapse() {
        let mut failures = BatchFailures::none();
        failures.fail("m-1".to_string());
        failures.fail("m-2".to_string());
        failures.fail("m-1".to_string());
        assert_eq!(failures.len(), 2);
        assert!(failures.contains("m-1"));
    }
}
