use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use caseflow_core::{
    ManualClock, MemoryObjectStore, MemoryParameterSource, ParameterResolver, TenantId,
};
use caseflow_index::{
    ChangeOp, EntityType, IndexConsumer, IndexNotification, MemorySearchIndex,
};
use caseflow_queue::{BatchProcessor, QueueRecord};

const PREFIX_KEY: &str = "prod/eu/search/index-prefix";

struct Fixture {
    params: Arc<MemoryParameterSource>,
    search: Arc<MemorySearchIndex>,
    objects: Arc<MemoryObjectStore>,
    consumer: IndexConsumer,
}

fn create_fixture() -> Fixture {
    let params = Arc::new(MemoryParameterSource::new());
    params.set(PREFIX_KEY, "search");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let resolver = Arc::new(ParameterResolver::new(
        params.clone(),
        clock,
        Duration::from_secs(300),
    ));
    let search = Arc::new(MemorySearchIndex::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let consumer = IndexConsumer::new(
        search.clone(),
        objects.clone(),
        resolver,
        "prod",
        "eu",
    );
    Fixture {
        params,
        search,
        objects,
        consumer,
    }
}

fn notification_record(
    message_id: &str,
    tenant: &str,
    entity_type: EntityType,
    op: ChangeOp,
    snapshot: serde_json::Value,
) -> QueueRecord {
    let notification = IndexNotification {
        tenant_id: TenantId::new(tenant),
        entity_type,
        op,
        snapshot,
    };
    QueueRecord::new(message_id, serde_json::to_string(&notification).unwrap())
}

#[tokio::test]
async fn test_contact_change_is_upserted_into_the_contacts_index() {
    let fixture = create_fixture();
    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-1", "status": "open"}),
    );

    let failures = fixture.consumer.process_batch(vec![record]).await;

    assert!(failures.is_empty());
    let doc = fixture
        .search
        .document(&TenantId::new("tenant-a"), "search-tenant-a-contacts", "c-1")
        .unwrap();
    assert_eq!(doc["status"], "open");
}

#[tokio::test]
async fn test_contact_with_case_refreshes_the_case_rollup() {
    let fixture = create_fixture();
    let tenant = TenantId::new("tenant-a");
    fixture.search.put_document(
        &tenant,
        "search-tenant-a-cases",
        "k-9",
        json!({"id": "k-9", "subject": "billing"}),
    );

    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Update,
        json!({"id": "c-1", "case_id": "k-9", "status": "closed", "channel": "chat"}),
    );

    let failures = fixture.consumer.process_batch(vec![record]).await;

    assert!(failures.is_empty());
    let case = fixture
        .search
        .document(&tenant, "search-tenant-a-cases", "k-9")
        .unwrap();
    assert_eq!(case["subject"], "billing");
    assert_eq!(case["last_contact_id"], "c-1");
    assert_eq!(case["last_contact_status"], "closed");
    assert_eq!(case["last_contact_channel"], "chat");
}

#[tokio::test]
async fn test_case_create_is_visible_to_a_later_contact_in_the_same_batch() {
    let fixture = create_fixture();
    let tenant = TenantId::new("tenant-a");

    // The case arrives in the same batch as the contact pointing at it;
    // within a tenant, arrival order must hold.
    let case = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Case,
        ChangeOp::Create,
        json!({"id": "k-9", "subject": "billing"}),
    );
    let contact = notification_record(
        "m-2",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-1", "case_id": "k-9", "status": "open"}),
    );

    let failures = fixture.consumer.process_batch(vec![case, contact]).await;

    assert!(failures.is_empty());
    let case = fixture
        .search
        .document(&tenant, "search-tenant-a-cases", "k-9")
        .unwrap();
    assert_eq!(case["last_contact_id"], "c-1");
}

#[tokio::test]
async fn test_delete_removes_the_document() {
    let fixture = create_fixture();
    let tenant = TenantId::new("tenant-a");
    fixture.search.put_document(
        &tenant,
        "search-tenant-a-contacts",
        "c-1",
        json!({"id": "c-1"}),
    );

    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Delete,
        json!({"id": "c-1"}),
    );

    let failures = fixture.consumer.process_batch(vec![record]).await;

    assert!(failures.is_empty());
    assert!(fixture
        .search
        .document(&tenant, "search-tenant-a-contacts", "c-1")
        .is_none());
}

#[tokio::test]
async fn test_failed_bulk_item_fails_only_its_message() {
    let fixture = create_fixture();
    fixture.search.set_doc_failing("c-bad", 500);

    let good = notification_record(
        "m-good",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-good"}),
    );
    let bad = notification_record(
        "m-bad",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-bad"}),
    );

    let failures = fixture.consumer.process_batch(vec![good, bad]).await;

    assert_eq!(failures.ids(), ["m-bad"]);
    assert!(fixture
        .search
        .document(&TenantId::new("tenant-a"), "search-tenant-a-contacts", "c-good")
        .is_some());
}

#[tokio::test]
async fn test_transport_failure_fails_every_document_in_the_call() {
    let fixture = create_fixture();
    fixture.search.set_index_failing("search-tenant-a-contacts");

    let first = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-1"}),
    );
    let second = notification_record(
        "m-2",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-2"}),
    );
    // Another tenant's work is unaffected.
    let other = notification_record(
        "m-3",
        "tenant-b",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-3"}),
    );

    let failures = fixture.consumer.process_batch(vec![first, second, other]).await;

    assert!(failures.contains("m-1"));
    assert!(failures.contains("m-2"));
    assert!(!failures.contains("m-3"));
    assert!(fixture
        .search
        .document(&TenantId::new("tenant-b"), "search-tenant-b-contacts", "c-3")
        .is_some());
}

#[tokio::test]
async fn test_malformed_notification_fails_only_itself() {
    let fixture = create_fixture();
    let good = notification_record(
        "m-good",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"id": "c-1"}),
    );
    let bad = QueueRecord::new("m-bad", "{ not json");

    let failures = fixture.consumer.process_batch(vec![bad, good]).await;

    assert_eq!(failures.ids(), ["m-bad"]);
}

#[tokio::test]
async fn test_snapshot_without_id_fails_only_itself() {
    let fixture = create_fixture();
    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Create,
        json!({"status": "open"}),
    );

    let failures = fixture.consumer.process_batch(vec![record]).await;

    assert_eq!(failures.ids(), ["m-1"]);
}

#[tokio::test]
async fn test_missing_index_prefix_fails_the_whole_batch() {
    let fixture = create_fixture();
    fixture.params.remove(PREFIX_KEY);

    let records = vec![
        notification_record(
            "m-1",
            "tenant-a",
            EntityType::Contact,
            ChangeOp::Create,
            json!({"id": "c-1"}),
        ),
        notification_record(
            "m-2",
            "tenant-b",
            EntityType::Case,
            ChangeOp::Create,
            json!({"id": "k-1"}),
        ),
    ];

    let failures = fixture.consumer.process_batch(records).await;

    assert_eq!(failures.len(), 2);
    assert!(fixture
        .search
        .document(&TenantId::new("tenant-a"), "search-tenant-a-contacts", "c-1")
        .is_none());
}

#[tokio::test]
async fn test_enrichment_embeds_transcript_text_when_enabled() {
    let fixture = create_fixture();
    fixture
        .params
        .set("prod/tenant-a/feature/index-transcripts", "true");
    fixture.objects.put(
        "tenant-a/transcripts/c-1.json",
        &b"hello from the call"[..],
    );

    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Update,
        json!({"id": "c-1", "status": "closed"}),
    );

    let failures = fixture.consumer.process_batch(vec![record]).await;

    assert!(failures.is_empty());
    let doc = fixture
        .search
        .document(&TenantId::new("tenant-a"), "search-tenant-a-contacts", "c-1")
        .unwrap();
    assert_eq!(doc["transcript"], "hello from the call");
}

#[tokio::test]
async fn test_enrichment_defaults_off_when_flag_is_absent() {
    let fixture = create_fixture();
    fixture
        .objects
        .put("tenant-a/transcripts/c-1.json", &b"text"[..]);

    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Update,
        json!({"id": "c-1"}),
    );

    fixture.consumer.process_batch(vec![record]).await;

    let doc = fixture
        .search
        .document(&TenantId::new("tenant-a"), "search-tenant-a-contacts", "c-1")
        .unwrap();
    assert!(doc.get("transcript").is_none());
}

#[tokio::test]
async fn test_missing_transcript_degrades_to_unenriched_indexing() {
    let fixture = create_fixture();
    fixture
        .params
        .set("prod/tenant-a/feature/index-transcripts", "true");
    // No artifact stored for c-1.

    let record = notification_record(
        "m-1",
        "tenant-a",
        EntityType::Contact,
        ChangeOp::Update,
        json!({"id": "c-1", "status": "closed"}),
    );

    let failures = fixture.consumer.process_batch(vec![record]).await;

    // The document still indexes, just without transcript text.
    assert!(failures.is_empty());
    let doc = fixture
        .search
        .document(&TenantId::new("tenant-a"), "search-tenant-a-contacts", "c-1")
        .unwrap();
    assert_eq!(doc["status"], "closed");
    assert!(doc.get("transcript").is_none());
}
