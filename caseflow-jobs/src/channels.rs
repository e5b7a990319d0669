//! Third-party conversation-channel capability.
//!
//! Transcript jobs provision a conversation channel on the provider; the
//! cleanup task tears it down once the transcript artifact is durably
//! stored. "Already gone" is its own variant because cleanup treats it as
//! success.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use caseflow_core::{FailureKind, TenantId};
use parking_lot::RwLock;
use thiserror::Error;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors from the conversation provider.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The channel does not exist (any more). Terminal, treated as success
    /// by cleanup.
    #[error("channel not found: {channel_id}")]
    NotFound { channel_id: String },

    /// The provider call failed for a retryable reason.
    #[error("provider error for channel {channel_id}: {message}")]
    Provider { channel_id: String, message: String },
}

impl ChannelError {
    /// Create a not-found error.
    pub fn not_found<S: Into<String>>(channel_id: S) -> Self {
        Self::NotFound {
            channel_id: channel_id.into(),
        }
    }

    /// Create a provider error.
    pub fn provider<C: Into<String>, M: Into<String>>(channel_id: C, message: M) -> Self {
        Self::Provider {
            channel_id: channel_id.into(),
            message: message.into(),
        }
    }

    /// Classify into the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFoundTerminal,
            Self::Provider { .. } => FailureKind::Transient,
        }
    }
}

/// Capability trait over the conversation provider.
#[async_trait]
pub trait ConversationChannels: Send + Sync {
    /// Delete a provisioned channel.
    async fn delete_channel(&self, tenant_id: &TenantId, channel_id: &str) -> ChannelResult<()>;
}

/// In-memory provider for tests and development.
#[derive(Default)]
pub struct MemoryChannels {
    channels: RwLock<HashSet<(TenantId, String)>>,
    failing: RwLock<HashMap<String, String>>,
    delete_calls: RwLock<Vec<String>>,
}

impl MemoryChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a channel.
    pub fn provision(&self, tenant_id: &TenantId, channel_id: &str) {
        self.channels
            .write()
            .insert((tenant_id.clone(), channel_id.to_string()));
    }

    /// Whether the channel currently exists.
    pub fn exists(&self, tenant_id: &TenantId, channel_id: &str) -> bool {
        self.channels
            .read()
            .contains(&(tenant_id.clone(), channel_id.to_string()))
    }

    /// Make deletion of a channel fail with a provider error.
    pub fn set_failing<C: Into<String>, M: Into<String>>(&self, channel_id: C, message: M) {
        self.failing.write().insert(channel_id.into(), message.into());
    }

    /// Every channel id a delete was attempted for, in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.read().clone()
    }
}

#[async_trait]
impl ConversationChannels for MemoryChannels {
    async fn delete_channel(&self, tenant_id: &TenantId, channel_id: &str) -> ChannelResult<()> {
        self.delete_calls.write().push(channel_id.to_string());

        if let Some(message) = self.failing.read().get(channel_id) {
            return Err(ChannelError::provider(channel_id, message.clone()));
        }

        let removed = self
            .channels
            .write()
            .remove(&(tenant_id.clone(), channel_id.to_string()));
        if removed {
            Ok(())
        } else {
            Err(ChannelError::not_found(channel_id))
        }
    }
}
