use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use caseflow_core::{
    keys, Clock, ManualClock, MemoryParameterSource, ParamError, ParameterResolver, TenantId,
};

fn create_resolver(ttl_secs: u64) -> (Arc<MemoryParameterSource>, Arc<ManualClock>, ParameterResolver) {
    let source = Arc::new(MemoryParameterSource::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let resolver = ParameterResolver::new(
        source.clone(),
        clock.clone(),
        Duration::from_secs(ttl_secs),
    );
    (source, clock, resolver)
}

#[tokio::test]
async fn test_value_is_cached_until_ttl_expires() {
    let (source, clock, resolver) = create_resolver(300);
    source.set("prod/eu/jobs/transcript/queue-url", "https://queue/one");

    // Arrange: prime the cache
    let first = resolver.get("prod/eu/jobs/transcript/queue-url").await.unwrap();
    assert_eq!(first, "https://queue/one");

    // Act: change the source value while the cache entry is fresh
    source.set("prod/eu/jobs/transcript/queue-url", "https://queue/two");
    clock.advance(chrono::Duration::seconds(299));

    // Assert: still served from cache
    let cached = resolver.get("prod/eu/jobs/transcript/queue-url").await.unwrap();
    assert_eq!(cached, "https://queue/one");

    // Act: cross the TTL boundary
    clock.advance(chrono::Duration::seconds(2));

    // Assert: refetched from source
    let refreshed = resolver.get("prod/eu/jobs/transcript/queue-url").await.unwrap();
    assert_eq!(refreshed, "https://queue/two");
}

#[tokio::test]
async fn test_not_configured_is_distinct_and_not_cached() {
    let (source, _clock, resolver) = create_resolver(300);

    // Act: look up an absent key
    let miss = resolver.get("prod/eu/jobs/recording/queue-url").await;

    // Assert: the miss is the distinct catchable condition
    assert!(matches!(miss, Err(ParamError::NotConfigured { .. })));

    // Act: configure the key and look it up again without advancing time
    source.set("prod/eu/jobs/recording/queue-url", "https://queue/rec");
    let hit = resolver.get("prod/eu/jobs/recording/queue-url").await.unwrap();

    // Assert: the earlier miss was not cached
    assert_eq!(hit, "https://queue/rec");
}

#[tokio::test]
async fn test_source_failure_is_not_a_lookup_miss() {
    let (source, _clock, resolver) = create_resolver(300);
    source.set_failing("prod/eu/search/index-prefix", "throttled");

    let err = resolver.get("prod/eu/search/index-prefix").await.unwrap_err();
    assert!(matches!(err, ParamError::Source { .. }));
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let (source, _clock, resolver) = create_resolver(300);
    source.set("prod/tenant-a/feature/index-transcripts", "true");

    assert!(resolver
        .get_bool("prod/tenant-a/feature/index-transcripts")
        .await
        .unwrap());

    source.set("prod/tenant-a/feature/index-transcripts", "false");
    resolver.invalidate("prod/tenant-a/feature/index-transcripts");

    assert!(!resolver
        .get_bool("prod/tenant-a/feature/index-transcripts")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_typed_getter_rejects_garbage() {
    let (source, _clock, resolver) = create_resolver(300);
    source.set("prod/eu/jobs/max-attempts", "many");

    let err = resolver.get_u32("prod/eu/jobs/max-attempts").await.unwrap_err();
    assert!(matches!(err, ParamError::Source { .. }));
}

#[test]
fn test_key_layout() {
    let tenant = TenantId::new("tenant-a");
    assert_eq!(
        keys::job_queue_url("prod", "eu", "transcript"),
        "prod/eu/jobs/transcript/queue-url"
    );
    assert_eq!(keys::max_attempts("prod", "eu"), "prod/eu/jobs/max-attempts");
    assert_eq!(keys::index_prefix("prod", "eu"), "prod/eu/search/index-prefix");
    assert_eq!(
        keys::index_transcripts("prod", &tenant),
        "prod/tenant-a/feature/index-transcripts"
    );
    assert_eq!(
        keys::retention_days("prod", &tenant),
        "prod/tenant-a/cleanup/retention-days"
    );
}

#[test]
fn test_manual_clock_advances() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    let before = clock.now();
    clock.advance(chrono::Duration::days(3));
    assert_eq!(clock.now() - before, chrono::Duration::days(3));
}
