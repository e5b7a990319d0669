//! Outbound queue transport capability.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use caseflow_core::FailureKind;
use parking_lot::RwLock;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors from the outbound queue transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("queue send failed for {queue_url}: {message}")]
    Send { queue_url: String, message: String },
}

impl TransportError {
    /// Create a send error.
    pub fn send<Q: Into<String>, M: Into<String>>(queue_url: Q, message: M) -> Self {
        Self::Send {
            queue_url: queue_url.into(),
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Send { .. } => FailureKind::Transient,
        }
    }
}

/// Capability trait for enqueueing one message.
///
/// There is deliberately no retry here: the queue's own redelivery is the
/// retry mechanism, and producers surface send failures to their callers.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn send(&self, queue_url: &str, body: String) -> TransportResult<()>;
}

/// In-memory transport for tests and development.
#[derive(Default)]
pub struct MemoryTransport {
    queues: RwLock<HashMap<String, VecDeque<String>>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent to a queue, in order.
    pub fn sent(&self, queue_url: &str) -> Vec<String> {
        self.queues
            .read()
            .get(queue_url)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return everything sent to a queue.
    pub fn drain(&self, queue_url: &str) -> Vec<String> {
        self.queues
            .write()
            .remove(queue_url)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default()
    }

    /// Total number of messages across all queues.
    pub fn total_sent(&self) -> usize {
        self.queues.read().values().map(|q| q.len()).sum()
    }

    /// Make every send to a queue fail.
    pub fn set_failing<Q: Into<String>>(&self, queue_url: Q) {
        self.failing.write().insert(queue_url.into());
    }

    /// Clear a previously injected failure.
    pub fn clear_failing(&self, queue_url: &str) {
        self.failing.write().remove(queue_url);
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn send(&self, queue_url: &str, body: String) -> TransportResult<()> {
        if self.failing.read().contains(queue_url) {
            return Err(TransportError::send(queue_url, "injected send failure"));
        }
        self.queues
            .write()
            .entry(queue_url.to_string())
            .or_default()
            .push_back(body);
        Ok(())
    }
}
