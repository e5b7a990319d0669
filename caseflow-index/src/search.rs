//! Search-index capability and bulk-operation types.
//!
//! One `bulk` call carries a batch of operations against a single
//! tenant-scoped index and returns an itemized response: one [`BulkItem`]
//! per operation, in order, so callers can attribute each outcome to the
//! originating message. A transport-level failure fails the whole call.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use caseflow_core::{FailureKind, TenantId};
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors from the search index.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The bulk call failed as a whole (network, 5xx on the request itself).
    #[error("bulk request to index {index} failed: {message}")]
    Bulk { index: String, message: String },
}

impl SearchError {
    /// Create a bulk transport error.
    pub fn bulk<I: Into<String>, M: Into<String>>(index: I, message: M) -> Self {
        Self::Bulk {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Bulk { .. } => FailureKind::Transient,
        }
    }
}

/// Kind of bulk instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    /// Upsert the full document.
    Index,

    /// Partial update via a script, so a rollup can change without
    /// re-sending the parent document.
    UpdateScripted,

    /// Remove the document.
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::UpdateScripted => "update_scripted",
            Self::Delete => "delete",
        }
    }
}

/// One bulk instruction against a single index.
#[derive(Debug, Clone)]
pub struct BulkOp {
    pub action: BulkAction,
    pub doc_id: String,

    /// Full document for `Index`.
    pub document: Option<Value>,

    /// Script body for `UpdateScripted`: `{ "source": ..., "params": ... }`.
    pub script: Option<Value>,
}

impl BulkOp {
    /// Create an upsert operation.
    pub fn index<I: Into<String>>(doc_id: I, document: Value) -> Self {
        Self {
            action: BulkAction::Index,
            doc_id: doc_id.into(),
            document: Some(document),
            script: None,
        }
    }

    /// Create a scripted partial update.
    pub fn update_scripted<I: Into<String>>(doc_id: I, script: Value) -> Self {
        Self {
            action: BulkAction::UpdateScripted,
            doc_id: doc_id.into(),
            document: None,
            script: Some(script),
        }
    }

    /// Create a delete operation.
    pub fn delete<I: Into<String>>(doc_id: I) -> Self {
        Self {
            action: BulkAction::Delete,
            doc_id: doc_id.into(),
            document: None,
            script: None,
        }
    }
}

/// Per-operation outcome from a bulk call.
#[derive(Debug, Clone)]
pub struct BulkItem {
    pub doc_id: String,
    pub status: u16,
    pub error: Option<String>,
}

impl BulkItem {
    /// Whether the status is a recognized success code.
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

/// Capability trait over a tenant-scoped search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Execute operations against one index in one round trip.
    ///
    /// The response has exactly one item per operation, in order.
    async fn bulk(
        &self,
        tenant_id: &TenantId,
        index: &str,
        ops: Vec<BulkOp>,
    ) -> SearchResult<Vec<BulkItem>>;
}

type DocKey = (String, String); // (tenant, index)

/// In-memory search index for tests and development.
///
/// Applies operations to per-(tenant, index) document maps. Tests can
/// inject per-document item failures or fail a whole index at the
/// transport level.
#[derive(Default)]
pub struct MemorySearchIndex {
    docs: RwLock<HashMap<DocKey, HashMap<String, Value>>>,
    failing_docs: RwLock<HashMap<String, u16>>,
    failing_indices: RwLock<HashSet<String>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored document.
    pub fn document(&self, tenant_id: &TenantId, index: &str, doc_id: &str) -> Option<Value> {
        self.docs
            .read()
            .get(&(tenant_id.to_string(), index.to_string()))
            .and_then(|docs| docs.get(doc_id))
            .cloned()
    }

    /// Seed a document directly.
    pub fn put_document<D: Into<String>>(
        &self,
        tenant_id: &TenantId,
        index: &str,
        doc_id: D,
        document: Value,
    ) {
        self.docs
            .write()
            .entry((tenant_id.to_string(), index.to_string()))
            .or_default()
            .insert(doc_id.into(), document);
    }

    /// Make operations on a document id report the given item status.
    pub fn set_doc_failing<D: Into<String>>(&self, doc_id: D, status: u16) {
        self.failing_docs.write().insert(doc_id.into(), status);
    }

    /// Make every bulk call against an index fail at the transport level.
    pub fn set_index_failing<I: Into<String>>(&self, index: I) {
        self.failing_indices.write().insert(index.into());
    }

    fn apply(&self, key: &DocKey, op: &BulkOp) -> BulkItem {
        let mut docs = self.docs.write();
        let index_docs = docs.entry(key.clone()).or_default();

        match op.action {
            BulkAction::Index => {
                let document = op.document.clone().unwrap_or(Value::Null);
                index_docs.insert(op.doc_id.clone(), document);
                BulkItem {
                    doc_id: op.doc_id.clone(),
                    status: 201,
                    error: None,
                }
            }
            BulkAction::UpdateScripted => match index_docs.get_mut(&op.doc_id) {
                Some(existing) => {
                    // Simulate the script by merging its params into the doc.
                    if let (Value::Object(doc), Some(Value::Object(params))) = (
                        existing,
                        op.script.as_ref().and_then(|s| s.get("params")).cloned(),
                    ) {
                        for (key, value) in params {
                            doc.insert(key, value);
                        }
                    }
                    BulkItem {
                        doc_id: op.doc_id.clone(),
                        status: 200,
                        error: None,
                    }
                }
                None => BulkItem {
                    doc_id: op.doc_id.clone(),
                    status: 404,
                    error: Some("document missing".to_string()),
                },
            },
            BulkAction::Delete => {
                index_docs.remove(&op.doc_id);
                BulkItem {
                    doc_id: op.doc_id.clone(),
                    status: 200,
                    error: None,
                }
            }
        }
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn bulk(
        &self,
        tenant_id: &TenantId,
        index: &str,
        ops: Vec<BulkOp>,
    ) -> SearchResult<Vec<BulkItem>> {
        if self.failing_indices.read().contains(index) {
            return Err(SearchError::bulk(index, "injected transport failure"));
        }

        let key = (tenant_id.to_string(), index.to_string());
        let mut items = Vec::with_capacity(ops.len());
        for op in &ops {
            if let Some(status) = self.failing_docs.read().get(&op.doc_id) {
                items.push(BulkItem {
                    doc_id: op.doc_id.clone(),
                    status: *status,
                    error: Some("injected item failure".to_string()),
                });
                continue;
            }
            items.push(self.apply(&key, op));
        }
        Ok(items)
    }
}
