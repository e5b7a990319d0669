use serde::{Deserialize, Serialize};
use serde_json::Value;

use caseflow_core::TenantId;

/// Entity kinds the search index knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Contact,
    Case,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Case => "case",
        }
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
    Reindex,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reindex => "reindex",
        }
    }
}

/// One entity-change notification.
///
/// Ephemeral: never persisted, redelivered by the queue on failure. Carries
/// the entity snapshot needed to build the search document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexNotification {
    pub tenant_id: TenantId,
    pub entity_type: EntityType,
    pub op: ChangeOp,
    pub snapshot: Value,
}

impl IndexNotification {
    /// The entity id from the snapshot, if present.
    pub fn entity_id(&self) -> Option<&str> {
        self.snapshot.get("id").and_then(Value::as_str)
    }
}
