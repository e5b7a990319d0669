//! Notification → bulk-operation mapping.
//!
//! A contact change becomes an upsert into the tenant's contacts index and,
//! when the contact belongs to a case, an additional scripted update into
//! the cases index that rewrites the case's contact rollup in place. A case
//! change is a single upsert; a delete of either entity is a delete
//! operation. The mapping is pure; enrichment happens before it runs.

use serde_json::{json, Value};
use thiserror::Error;

use caseflow_core::{FailureKind, TenantId};

use crate::notification::{ChangeOp, EntityType, IndexNotification};
use crate::search::BulkOp;

/// Errors from mapping one notification.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("snapshot carries no entity id")]
    MissingEntityId,
}

impl MapError {
    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingEntityId => FailureKind::Malformed,
        }
    }
}

/// Name of a tenant's contacts index.
pub fn contacts_index(prefix: &str, tenant_id: &TenantId) -> String {
    format!("{prefix}-{tenant_id}-contacts")
}

/// Name of a tenant's cases index.
pub fn cases_index(prefix: &str, tenant_id: &TenantId) -> String {
    format!("{prefix}-{tenant_id}-cases")
}

/// Map one notification to its bulk operations, paired with target index
/// names, in application order.
pub fn map_notification(
    prefix: &str,
    notification: &IndexNotification,
) -> Result<Vec<(String, BulkOp)>, MapError> {
    let entity_id = notification
        .entity_id()
        .ok_or(MapError::MissingEntityId)?
        .to_string();
    let tenant_id = &notification.tenant_id;

    let ops = match (notification.entity_type, notification.op) {
        (EntityType::Contact, ChangeOp::Delete) => vec![(
            contacts_index(prefix, tenant_id),
            BulkOp::delete(entity_id),
        )],
        (EntityType::Case, ChangeOp::Delete) => {
            vec![(cases_index(prefix, tenant_id), BulkOp::delete(entity_id))]
        }
        (EntityType::Contact, _) => {
            let mut ops = vec![(
                contacts_index(prefix, tenant_id),
                BulkOp::index(entity_id.clone(), notification.snapshot.clone()),
            )];
            // A contact tied to a case also refreshes that case's rollup.
            if let Some(case_id) = notification.snapshot.get("case_id").and_then(Value::as_str) {
                ops.push((
                    cases_index(prefix, tenant_id),
                    BulkOp::update_scripted(case_id, case_rollup_script(&entity_id, notification)),
                ));
            }
            ops
        }
        (EntityType::Case, _) => vec![(
            cases_index(prefix, tenant_id),
            BulkOp::index(entity_id, notification.snapshot.clone()),
        )],
    };

    Ok(ops)
}

/// Script that replaces this contact's entry in the case's contact rollup
/// without re-sending the case document.
fn case_rollup_script(contact_id: &str, notification: &IndexNotification) -> Value {
    let rollup = json!({
        "last_contact_id": contact_id,
        "last_contact_status": notification.snapshot.get("status").cloned().unwrap_or(Value::Null),
        "last_contact_channel": notification.snapshot.get("channel").cloned().unwrap_or(Value::Null),
    });
    json!({
        "source": "ctx._source.putAll(params)",
        "params": rollup,
    })
}
