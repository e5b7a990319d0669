//! Object-storage capability.
//!
//! The pipeline reads object storage in two places: the cleanup task
//! confirms a job's durable artifact exists before tearing down provider
//! resources, and the index consumer fetches transcript text for document
//! enrichment. Neither needs writes or streaming, so the capability is a
//! narrow `head`/`get` pair.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;

use crate::error::FailureKind;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from object-storage reads.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage backend error for {key}: {message}")]
    Backend { key: String, message: String },
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a backend error.
    pub fn backend<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Backend {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFoundTerminal,
            Self::Backend { .. } => FailureKind::Transient,
        }
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

/// Read-side capability over object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get object metadata without content.
    async fn head(&self, key: &str) -> StorageResult<ObjectHead>;

    /// Get object content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;
}

/// In-memory object store for tests and development.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
    failing: RwLock<HashMap<String, String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object.
    pub fn put<K: Into<String>, B: Into<Bytes>>(&self, key: K, body: B) {
        self.objects.write().insert(key.into(), body.into());
    }

    /// Remove an object, so reads report `NotFound`.
    pub fn remove(&self, key: &str) {
        self.objects.write().remove(key);
    }

    /// Make every read of a key fail with a backend error.
    pub fn set_failing<K: Into<String>, M: Into<String>>(&self, key: K, message: M) {
        self.failing.write().insert(key.into(), message.into());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        if let Some(message) = self.failing.read().get(key) {
            return Err(StorageError::backend(key, message.clone()));
        }
        match self.objects.read().get(key) {
            Some(body) => Ok(ObjectHead {
                size_bytes: body.len() as u64,
                content_type: None,
            }),
            None => Err(StorageError::not_found(key)),
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if let Some(message) = self.failing.read().get(key) {
            return Err(StorageError::backend(key, message.clone()));
        }
        match self.objects.read().get(key) {
            Some(body) => Ok(body.clone()),
            None => Err(StorageError::not_found(key)),
        }
    }
}
