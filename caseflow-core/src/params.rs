//! # Parameter resolution
//!
//! Queue endpoints, retry policy, feature flags, and retention overrides all
//! live in an external parameter store, addressed by hierarchical path keys
//! (see [`keys`]). The store is reached through the [`ParameterSource`]
//! capability; [`ParameterResolver`] layers a TTL cache on top so hot keys
//! are fetched once per window.
//!
//! A lookup miss is not a failure. [`ParamError::NotConfigured`] is a
//! distinct, catchable condition: callers use it to decide "this feature is
//! disabled here", while [`ParamError::Source`] means the store itself
//! misbehaved and the caller should treat the lookup as retryable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;
use crate::error::FailureKind;

/// Result type for parameter operations.
pub type ParamResult<T> = Result<T, ParamError>;

/// Errors from parameter resolution.
#[derive(Error, Debug, Clone)]
pub enum ParamError {
    /// The key is absent from the store. Expected, non-fatal.
    #[error("parameter not configured: {key}")]
    NotConfigured { key: String },

    /// The store call itself failed, or the value could not be parsed.
    #[error("parameter source error for {key}: {message}")]
    Source { key: String, message: String },
}

impl ParamError {
    /// Create a lookup-miss error.
    pub fn not_configured<S: Into<String>>(key: S) -> Self {
        Self::NotConfigured { key: key.into() }
    }

    /// Create a source error.
    pub fn source<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Source {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotConfigured { .. } => FailureKind::ConfigAbsent,
            Self::Source { .. } => FailureKind::Transient,
        }
    }
}

/// Capability trait for the external parameter store.
#[async_trait]
pub trait ParameterSource: Send + Sync {
    /// Fetch the raw string value for a key.
    async fn fetch(&self, key: &str) -> ParamResult<String>;
}

#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    expires_at: DateTime<Utc>,
}

/// TTL cache over a [`ParameterSource`].
///
/// Constructed once at process start and shared by `Arc` with every
/// consumer. Reads are concurrent; a cache miss fetches through to the
/// source and stores the value until expiry. Misses (`NotConfigured`) are
/// never cached, so a key configured after startup is picked up on the next
/// lookup.
pub struct ParameterResolver {
    source: Arc<dyn ParameterSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedValue>>,
}

impl ParameterResolver {
    /// Create a resolver with the given cache TTL.
    pub fn new(source: Arc<dyn ParameterSource>, clock: Arc<dyn Clock>, ttl: StdDuration) -> Self {
        Self {
            source,
            clock,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(300)),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a key, serving from cache while the entry is fresh.
    pub async fn get(&self, key: &str) -> ParamResult<String> {
        let now = self.clock.now();

        {
            let cache = self.cache.read();
            if let Some(cached) = cache.get(key) {
                if cached.expires_at > now {
                    return Ok(cached.value.clone());
                }
            }
        }

        let value = self.source.fetch(key).await?;
        debug!(key, "parameter fetched from source");

        let mut cache = self.cache.write();
        cache.insert(
            key.to_string(),
            CachedValue {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );

        Ok(value)
    }

    /// Resolve a key and parse it as a boolean.
    pub async fn get_bool(&self, key: &str) -> ParamResult<bool> {
        let raw = self.get(key).await?;
        raw.parse::<bool>()
            .map_err(|_| ParamError::source(key, format!("not a boolean: {raw:?}")))
    }

    /// Resolve a key and parse it as an unsigned integer.
    pub async fn get_u32(&self, key: &str) -> ParamResult<u32> {
        let raw = self.get(key).await?;
        raw.parse::<u32>()
            .map_err(|_| ParamError::source(key, format!("not an unsigned integer: {raw:?}")))
    }

    /// Drop a single cached entry.
    pub fn invalidate(&self, key: &str) {
        self.cache.write().remove(key);
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.write().clear();
    }
}

/// Hierarchical key layout shared by producers and consumers.
///
/// Deployment-scoped keys are `{env}/{region}/...`; tenant-scoped keys are
/// `{env}/{tenant}/...`.
pub mod keys {
    use crate::tenant::TenantId;

    /// Queue URL for a job type: `{env}/{region}/jobs/{job_type}/queue-url`.
    pub fn job_queue_url(env: &str, region: &str, job_type: &str) -> String {
        format!("{env}/{region}/jobs/{job_type}/queue-url")
    }

    /// Retry ceiling for job attempts: `{env}/{region}/jobs/max-attempts`.
    pub fn max_attempts(env: &str, region: &str) -> String {
        format!("{env}/{region}/jobs/max-attempts")
    }

    /// Search index name prefix: `{env}/{region}/search/index-prefix`.
    pub fn index_prefix(env: &str, region: &str) -> String {
        format!("{env}/{region}/search/index-prefix")
    }

    /// Per-tenant transcript indexing flag:
    /// `{env}/{tenant}/feature/index-transcripts`.
    pub fn index_transcripts(env: &str, tenant: &TenantId) -> String {
        format!("{env}/{tenant}/feature/index-transcripts")
    }

    /// Per-tenant cleanup retention override:
    /// `{env}/{tenant}/cleanup/retention-days`.
    pub fn retention_days(env: &str, tenant: &TenantId) -> String {
        format!("{env}/{tenant}/cleanup/retention-days")
    }
}

/// In-memory parameter source for tests and development.
#[derive(Default)]
pub struct MemoryParameterSource {
    values: RwLock<HashMap<String, String>>,
    failing: RwLock<HashMap<String, String>>,
}

impl MemoryParameterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key to a value.
    pub fn set<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Remove a key, so lookups report `NotConfigured`.
    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }

    /// Make every fetch of a key fail with a source error.
    pub fn set_failing<K: Into<String>, M: Into<String>>(&self, key: K, message: M) {
        self.failing.write().insert(key.into(), message.into());
    }

    /// Clear a previously injected failure.
    pub fn clear_failing(&self, key: &str) {
        self.failing.write().remove(key);
    }
}

#[async_trait]
impl ParameterSource for MemoryParameterSource {
    async fn fetch(&self, key: &str) -> ParamResult<String> {
        if let Some(message) = self.failing.read().get(key) {
            return Err(ParamError::source(key, message.clone()));
        }
        match self.values.read().get(key) {
            Some(value) => Ok(value.clone()),
            None => Err(ParamError::not_configured(key)),
        }
    }
}
