//! Tenant identity for the pipeline.
//!
//! All job state, queues, parameters, and index names are partitioned by
//! tenant; every operation in this workspace takes a `TenantId` explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An isolated customer/account scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    /// Create a tenant ID from anything string-like.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self(tenant.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(tenant: String) -> Self {
        Self(tenant)
    }
}

impl From<&str> for TenantId {
    fn from(tenant: &str) -> Self {
        Self(tenant.to_string())
    }
}
