//! SyncHandler trait and production implementation
//!
//! The coordinator refetches through this seam so it never knows about
//! HTTP or the cache; tests plug in a recording mock.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::fetch::{FetchError, MessageApiClient};
use crate::state::{StateError, StateManager};

/// Errors from a refetch operation
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Refetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("State update failed: {0}")]
    State(#[from] StateError),
}

/// Refetchable targets, as the coordinator sees them
///
/// Implementations fetch fresh data from the server of record and replace
/// the cached copy. Both operations are idempotent reads.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    /// Refresh the cached conversation list
    async fn refetch_conversations(&self) -> Result<(), SyncError>;

    /// Refresh one conversation's cached messages
    async fn refetch_messages(&self, conversation_id: &str) -> Result<(), SyncError>;
}

/// Production handler: REST fetch, then authoritative replace into state
pub struct ApiSyncHandler {
    api: Arc<MessageApiClient>,
    state: StateManager,
    /// Optional page size for message refetches; None fetches the default page
    message_limit: Option<u32>,
}

impl ApiSyncHandler {
    /// Create a handler over the given API client and state actor
    pub fn new(api: Arc<MessageApiClient>, state: StateManager) -> Self {
        Self {
            api,
            state,
            message_limit: None,
        }
    }

    /// Limit message refetches to the newest `limit` entries
    pub fn with_message_limit(mut self, limit: u32) -> Self {
        self.message_limit = Some(limit);
        self
    }
}

#[async_trait]
impl SyncHandler for ApiSyncHandler {
    async fn refetch_conversations(&self) -> Result<(), SyncError> {
        debug!("refetch_conversations: called");
        let conversations = self.api.list_conversations().await?;
        self.state.replace_conversations(conversations).await?;
        Ok(())
    }

    async fn refetch_messages(&self, conversation_id: &str) -> Result<(), SyncError> {
        debug!(%conversation_id, "refetch_messages: called");
        let messages = self.api.list_messages(conversation_id, self.message_limit).await?;
        self.state.replace_messages(conversation_id, messages).await?;
        Ok(())
    }
}
