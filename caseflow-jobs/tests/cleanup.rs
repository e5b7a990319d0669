use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use caseflow_core::{
    Clock, ManualClock, MemoryObjectStore, MemoryParameterSource, ParameterResolver, TenantId,
};
use caseflow_jobs::{
    CleanupConfig, CleanupTask, ConversationChannels, JobRecord, JobStatus, JobStore, JobType,
    MemoryChannels, MemoryJobStore, StoreError,
};

struct Fixture {
    params: Arc<MemoryParameterSource>,
    store: Arc<MemoryJobStore>,
    channels: Arc<MemoryChannels>,
    objects: Arc<MemoryObjectStore>,
    clock: Arc<ManualClock>,
    task: CleanupTask,
}

fn create_fixture(config: CleanupConfig) -> Fixture {
    let params = Arc::new(MemoryParameterSource::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let resolver = Arc::new(ParameterResolver::new(
        params.clone(),
        clock.clone(),
        Duration::from_secs(300),
    ));
    let store = Arc::new(MemoryJobStore::new(clock.clone()));
    let channels = Arc::new(MemoryChannels::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let task = CleanupTask::new(
        store.clone(),
        resolver,
        channels.clone(),
        objects.clone(),
        clock.clone(),
        "prod",
        config,
    );
    Fixture {
        params,
        store,
        channels,
        objects,
        clock,
        task,
    }
}

/// Create a completed transcript job with its channel provisioned and its
/// artifact stored, then age the clock past it by `age_days`.
async fn create_completed_transcript(fixture: &Fixture, age_days: i64) -> JobRecord {
    let tenant = TenantId::new("tenant-a");
    let record = JobRecord::new(
        tenant.clone(),
        JobType::Transcript,
        "contact-1",
        json!({"channel_id": "ch-1"}),
        fixture.clock.now(),
    );
    fixture.store.create(record.clone()).await.unwrap();
    fixture.store.mark_active(&tenant, &record.job_id).await.unwrap();
    fixture
        .store
        .complete(&tenant, &record.job_id, Some("done".to_string()))
        .await
        .unwrap();

    fixture.channels.provision(&tenant, "ch-1");
    fixture
        .objects
        .put("tenant-a/transcripts/contact-1.json", &b"{\"lines\":[]}"[..]);

    fixture.clock.advance(chrono::Duration::days(age_days));
    record
}

#[tokio::test]
async fn test_teardown_order_then_delete() {
    let fixture = create_fixture(CleanupConfig::default());
    let record = create_completed_transcript(&fixture, 40).await;

    // Act: default retention is 30 days, the job is 40 days old
    let report = fixture.task.run().await.unwrap();

    // Assert: channel gone, record gone
    assert_eq!(report.deleted, 1);
    assert_eq!(report.quarantined, 0);
    assert!(!fixture.channels.exists(&record.tenant_id, "ch-1"));
    let gone = fixture.store.get(&record.tenant_id, &record.job_id).await;
    assert!(matches!(gone, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_fresh_jobs_are_retained() {
    let fixture = create_fixture(CleanupConfig::default());
    let record = create_completed_transcript(&fixture, 10).await;

    let report = fixture.task.run().await.unwrap();

    assert_eq!(report.deleted, 0);
    assert!(fixture
        .store
        .get(&record.tenant_id, &record.job_id)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_channel_already_gone_is_success() {
    let fixture = create_fixture(CleanupConfig::default());
    let record = create_completed_transcript(&fixture, 40).await;
    // Channel vanished out of band.
    fixture
        .channels
        .delete_channel(&record.tenant_id, "ch-1")
        .await
        .unwrap();

    let report = fixture.task.run().await.unwrap();

    assert_eq!(report.deleted, 1);
    assert!(matches!(
        fixture.store.get(&record.tenant_id, &record.job_id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_provider_failure_quarantines_and_keeps_record() {
    let fixture = create_fixture(CleanupConfig::default());
    let record = create_completed_transcript(&fixture, 40).await;
    fixture.channels.set_failing("ch-1", "rate limited");

    let report = fixture.task.run().await.unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(report.quarantined, 1);
    let stored = fixture
        .store
        .get(&record.tenant_id, &record.job_id)
        .await
        .unwrap();
    assert_eq!(stored.status, JobStatus::FailedPendingCleanup);
}

#[tokio::test]
async fn test_unconfirmed_artifact_blocks_channel_teardown() {
    let fixture = create_fixture(CleanupConfig::default());
    let record = create_completed_transcript(&fixture, 40).await;
    fixture.objects.remove("tenant-a/transcripts/contact-1.json");

    let report = fixture.task.run().await.unwrap();

    // Assert: quarantined without ever calling the provider
    assert_eq!(report.quarantined, 1);
    assert!(fixture.channels.delete_calls().is_empty());
    let stored = fixture
        .store
        .get(&record.tenant_id, &record.job_id)
        .await
        .unwrap();
    assert_eq!(stored.status, JobStatus::FailedPendingCleanup);
}

#[tokio::test]
async fn test_quarantined_jobs_are_never_deleted() {
    let fixture = create_fixture(CleanupConfig::default());
    let record = create_completed_transcript(&fixture, 40).await;
    fixture.channels.set_failing("ch-1", "rate limited");
    fixture.task.run().await.unwrap();

    // The store refuses deletion outright...
    let err = fixture
        .store
        .delete(&record.tenant_id, &record.job_id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    // ...and the next sweep does not pick the job up again.
    let report = fixture.task.run().await.unwrap();
    assert_eq!(report.deleted + report.quarantined + report.failed, 0);
    assert!(fixture
        .store
        .get(&record.tenant_id, &record.job_id)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_running_cleanup_twice_is_idempotent() {
    let fixture = create_fixture(CleanupConfig::default());
    create_completed_transcript(&fixture, 40).await;

    let first = fixture.task.run().await.unwrap();
    let second = fixture.task.run().await.unwrap();

    assert_eq!(first.deleted, 1);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.quarantined, 0);
}

#[tokio::test]
async fn test_retention_override_cannot_exceed_ceiling() {
    let config = CleanupConfig {
        default_retention_days: 30,
        max_retention_days: 90,
        ..Default::default()
    };
    let fixture = create_fixture(config);
    // Tenant asks for a year of retention; the ceiling is 90 days.
    fixture
        .params
        .set("prod/tenant-a/cleanup/retention-days", "365");
    let record = create_completed_transcript(&fixture, 100).await;

    let report = fixture.task.run().await.unwrap();

    // Assert: min(365, 90) = 90 < 100 days old, so the job is cleaned
    assert_eq!(report.deleted, 1);
    assert!(matches!(
        fixture.store.get(&record.tenant_id, &record.job_id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_retention_override_can_shorten_the_window() {
    let fixture = create_fixture(CleanupConfig::default());
    fixture.params.set("prod/tenant-a/cleanup/retention-days", "5");
    create_completed_transcript(&fixture, 10).await;

    let report = fixture.task.run().await.unwrap();

    // 10 days old > 5-day override, cleaned even though the default is 30
    assert_eq!(report.deleted, 1);
}

#[tokio::test]
async fn test_non_artifact_jobs_are_deleted_directly() {
    let fixture = create_fixture(CleanupConfig::default());
    let tenant = TenantId::new("tenant-a");
    let record = JobRecord::new(
        tenant.clone(),
        JobType::Recording,
        "contact-2",
        json!({}),
        fixture.clock.now(),
    );
    fixture.store.create(record.clone()).await.unwrap();
    fixture.store.mark_active(&tenant, &record.job_id).await.unwrap();
    fixture
        .store
        .complete(&tenant, &record.job_id, Some("url".to_string()))
        .await
        .unwrap();
    fixture.clock.advance(chrono::Duration::days(40));

    let report = fixture.task.run().await.unwrap();

    assert_eq!(report.deleted, 1);
    assert!(fixture.channels.delete_calls().is_empty());
}

#[tokio::test]
async fn test_one_failing_job_does_not_abort_the_sweep() {
    let fixture = create_fixture(CleanupConfig::default());
    let tenant = TenantId::new("tenant-a");

    // Job 1: provider failure. Job 2: healthy.
    let first = create_completed_transcript(&fixture, 40).await;
    fixture.channels.set_failing("ch-1", "rate limited");

    let second = JobRecord::new(
        tenant.clone(),
        JobType::Transcript,
        "contact-2",
        json!({"channel_id": "ch-2"}),
        fixture.clock.now() - chrono::Duration::days(40),
    );
    fixture.store.create(second.clone()).await.unwrap();
    fixture.store.mark_active(&tenant, &second.job_id).await.unwrap();
    fixture
        .store
        .complete(&tenant, &second.job_id, None)
        .await
        .unwrap();
    fixture.channels.provision(&tenant, "ch-2");
    fixture
        .objects
        .put("tenant-a/transcripts/contact-2.json", &b"{}"[..]);

    let report = fixture.task.run().await.unwrap();

    assert_eq!(report.quarantined, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(
        fixture.store.get(&tenant, &first.job_id).await.unwrap().status,
        JobStatus::FailedPendingCleanup
    );
    assert!(matches!(
        fixture.store.get(&tenant, &second.job_id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_deadline_leaves_remaining_jobs_for_next_run() {
    let config = CleanupConfig {
        deadline: Duration::from_secs(0),
        ..Default::default()
    };
    let fixture = create_fixture(config);
    create_completed_transcript(&fixture, 40).await;

    let report = fixture.task.run().await.unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped_deadline, 1);
    assert_eq!(report.skipped_tenants, 0);
}

#[tokio::test]
async fn test_deadline_accounts_for_unvisited_tenants() {
    let config = CleanupConfig {
        deadline: Duration::from_secs(0),
        ..Default::default()
    };
    let fixture = create_fixture(config);

    for tenant in ["tenant-a", "tenant-b"] {
        let record = JobRecord::new(
            TenantId::new(tenant),
            JobType::Recording,
            "contact-1",
            json!({}),
            fixture.clock.now(),
        );
        fixture.store.create(record.clone()).await.unwrap();
        fixture
            .store
            .mark_active(&record.tenant_id, &record.job_id)
            .await
            .unwrap();
        fixture
            .store
            .complete(&record.tenant_id, &record.job_id, None)
            .await
            .unwrap();
    }
    fixture.clock.advance(chrono::Duration::days(40));

    let report = fixture.task.run().await.unwrap();

    // The first tenant's candidate is counted; the second tenant was
    // never reached at all.
    assert_eq!(report.skipped_deadline, 1);
    assert_eq!(report.skipped_tenants, 1);
    assert_eq!(report.deleted, 0);
}
