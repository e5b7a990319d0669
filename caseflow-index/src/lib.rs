//! caseflow-index: keeps the search index in step with entity changes.
//!
//! Entity-change notifications arrive in batches, are grouped by tenant,
//! mapped to bulk operations against tenant-scoped indices, and executed
//! with per-document failure attribution: each bulk item's outcome is
//! reported against the message that produced it, and only failed messages
//! are redelivered.

pub mod consumer;
pub mod mapper;
pub mod notification;
pub mod search;

pub use consumer::IndexConsumer;
pub use mapper::{cases_index, contacts_index, map_notification, MapError};
pub use notification::{ChangeOp, EntityType, IndexNotification};
pub use search::{
    BulkAction, BulkItem, BulkOp, MemorySearchIndex, SearchError, SearchIndex, SearchResult,
};
