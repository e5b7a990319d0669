//! Search index consumer.
//!
//! Implements the batch contract directly (grouping rules out the
//! per-record runner): notifications are parsed, grouped by tenant in one
//! pass, optionally enriched with transcript text, mapped to bulk
//! operations, and executed one bulk call per (tenant, index). Ordering is
//! preserved within a tenant so scripted updates observe earlier upserts;
//! nothing is guaranteed across tenants.
//!
//! Failure attribution is per message: a malformed body or a failed bulk
//! item fails only the message that produced it, while a transport-level
//! bulk failure fails every message with an operation in that call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use caseflow_core::{keys, ObjectStore, ParamError, ParameterResolver, TenantId};
use caseflow_queue::{BatchFailures, BatchProcessor, QueueRecord};

use crate::mapper::map_notification;
use crate::notification::{ChangeOp, EntityType, IndexNotification};
use crate::search::{BulkOp, SearchIndex};

/// Object-storage key of a contact's transcript artifact.
fn transcript_key(tenant_id: &TenantId, contact_id: &str) -> String {
    format!("{tenant_id}/transcripts/{contact_id}.json")
}

/// One planned bulk operation, still tied to its originating message.
struct PlannedOp {
    op: BulkOp,
    message_id: String,
}

/// Batch consumer for entity-change notifications.
pub struct IndexConsumer {
    search: Arc<dyn SearchIndex>,
    objects: Arc<dyn ObjectStore>,
    params: Arc<ParameterResolver>,
    env: String,
    region: String,
}

impl IndexConsumer {
    pub fn new(
        search: Arc<dyn SearchIndex>,
        objects: Arc<dyn ObjectStore>,
        params: Arc<ParameterResolver>,
        env: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            search,
            objects,
            params,
            env: env.into(),
            region: region.into(),
        }
    }

    /// Whether transcript enrichment is enabled for a tenant. Lookup
    /// misses and source failures both mean "off"; only the latter is
    /// logged as a problem.
    async fn enrichment_enabled(&self, tenant_id: &TenantId) -> bool {
        let key = keys::index_transcripts(&self.env, tenant_id);
        match self.params.get_bool(&key).await {
            Ok(enabled) => enabled,
            Err(ParamError::NotConfigured { .. }) => false,
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    error = %err,
                    "transcript-flag lookup failed; indexing without enrichment"
                );
                false
            }
        }
    }

    /// Embed transcript text into a contact snapshot, degrading gracefully
    /// when the artifact is missing or storage misbehaves.
    async fn enrich(&self, tenant_id: &TenantId, notification: &mut IndexNotification) {
        let Some(contact_id) = notification.entity_id().map(str::to_string) else {
            return;
        };
        let key = transcript_key(tenant_id, &contact_id);
        match self.objects.get(&key).await {
            Ok(body) => {
                let text = String::from_utf8_lossy(&body).into_owned();
                if let Value::Object(snapshot) = &mut notification.snapshot {
                    snapshot.insert("transcript".to_string(), Value::String(text));
                }
            }
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    resource_id = %contact_id,
                    error = %err,
                    "transcript fetch failed; indexing without enrichment"
                );
            }
        }
    }

    /// Apply one tenant's notifications in arrival order. Returns the
    /// message ids that must be redelivered.
    async fn apply_tenant(
        &self,
        prefix: &str,
        tenant_id: &TenantId,
        notifications: Vec<(String, IndexNotification)>,
    ) -> Vec<String> {
        let enrich = self.enrichment_enabled(tenant_id).await;
        let mut failed = Vec::new();

        // Plan all ops first, preserving arrival order per target index.
        let mut index_order: Vec<String> = Vec::new();
        let mut planned: HashMap<String, Vec<PlannedOp>> = HashMap::new();

        for (message_id, mut notification) in notifications {
            let wants_enrichment = enrich
                && notification.entity_type == EntityType::Contact
                && notification.op != ChangeOp::Delete;
            if wants_enrichment {
                self.enrich(tenant_id, &mut notification).await;
            }

            match map_notification(prefix, &notification) {
                Ok(ops) => {
                    for (index, op) in ops {
                        if !planned.contains_key(&index) {
                            index_order.push(index.clone());
                        }
                        planned.entry(index).or_default().push(PlannedOp {
                            op,
                            message_id: message_id.clone(),
                        });
                    }
                }
                Err(err) => {
                    warn!(
                        tenant_id = %tenant_id,
                        message_id = %message_id,
                        kind = err.kind().as_str(),
                        error = %err,
                        "notification cannot be mapped; scheduling redelivery"
                    );
                    failed.push(message_id);
                }
            }
        }

        // One bulk call per index, sequential within the tenant.
        for index in index_order {
            let batch = planned.remove(&index).unwrap_or_default();
            let (ops, message_ids): (Vec<BulkOp>, Vec<String>) = batch
                .into_iter()
                .map(|planned| (planned.op, planned.message_id))
                .unzip();

            match self.search.bulk(tenant_id, &index, ops).await {
                Ok(items) => {
                    if items.len() != message_ids.len() {
                        error!(
                            tenant_id = %tenant_id,
                            index,
                            expected = message_ids.len(),
                            got = items.len(),
                            "bulk response item count mismatch; failing the whole call"
                        );
                        failed.extend(message_ids);
                        continue;
                    }
                    for (item, message_id) in items.iter().zip(message_ids) {
                        if item.is_success() {
                            continue;
                        }
                        warn!(
                            tenant_id = %tenant_id,
                            index,
                            doc_id = %item.doc_id,
                            status = item.status,
                            error = item.error.as_deref().unwrap_or(""),
                            message_id = %message_id,
                            "bulk item failed; scheduling redelivery"
                        );
                        failed.push(message_id);
                    }
                }
                Err(err) => {
                    error!(
                        tenant_id = %tenant_id,
                        index,
                        kind = err.kind().as_str(),
                        error = %err,
                        documents = message_ids.len(),
                        "bulk call failed; failing every document it contained"
                    );
                    failed.extend(message_ids);
                }
            }
        }

        failed
    }
}

#[async_trait]
impl BatchProcessor for IndexConsumer {
    async fn process_batch(&self, records: Vec<QueueRecord>) -> BatchFailures {
        // Without the index prefix no index can be named, so no record
        // could possibly be processed: the whole batch fails.
        let prefix_key = keys::index_prefix(&self.env, &self.region);
        let prefix = match self.params.get(&prefix_key).await {
            Ok(prefix) => prefix,
            Err(err) => {
                error!(
                    kind = err.kind().as_str(),
                    error = %err,
                    batch_size = records.len(),
                    "index prefix unavailable; reporting every record for redelivery"
                );
                return BatchFailures::fail_all(&records);
            }
        };

        let mut failures = BatchFailures::none();

        // Single-pass grouping by tenant, preserving arrival order.
        let mut by_tenant: HashMap<TenantId, Vec<(String, IndexNotification)>> = HashMap::new();
        for record in &records {
            match serde_json::from_str::<IndexNotification>(&record.body) {
                Ok(notification) => {
                    by_tenant
                        .entry(notification.tenant_id.clone())
                        .or_default()
                        .push((record.message_id.clone(), notification));
                }
                Err(err) => {
                    warn!(
                        message_id = %record.message_id,
                        error = %err,
                        "malformed notification; scheduling redelivery"
                    );
                    failures.fail(record.message_id.clone());
                }
            }
        }

        for (tenant_id, notifications) in by_tenant {
            debug!(
                tenant_id = %tenant_id,
                notifications = notifications.len(),
                "applying tenant notification group"
            );
            let failed = self.apply_tenant(&prefix, &tenant_id, notifications).await;
            failures.extend(failed);
        }

        failures
    }
}
