//! Channel registry: register and lookup channels by id.

use crate::channels::OutboundReply;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
    #[error("channel not configured: {0}")]
    NotConfigured(&'static str),
    #[error("channel stopped")]
    Stopped,
}

/// Handle to a running channel (stop, send replies, profile lookups).
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "slack").
    fn id(&self) -> &str;
    /// Stop the channel connector; later sends fail with [`ChannelError::Stopped`].
    fn stop(&self);
    /// Send `reply` into `conversation_id`, threaded under `reply.thread_anchor`.
    async fn send_reply(
        &self,
        conversation_id: &str,
        reply: &OutboundReply,
    ) -> Result<(), ChannelError>;
    /// Civil timezone from the user's profile, if the platform knows it.
    async fn user_timezone(&self, _user_id: &str) -> Result<Option<String>, ChannelError> {
        Ok(None)
    }
}

/// Registry of channel ids to handles. Shared across gateway.
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn ChannelHandle>>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: String, handle: Arc<dyn ChannelHandle>) {
        let mut g = self.inner.write().await;
        if let Some(old) = g.insert(id.clone(), handle) {
            old.stop();
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn ChannelHandle>> {
        let g = self.inner.read().await;
        g.get(id).cloned()
    }

    /// Stop every registered channel.
    pub async fn stop_all(&self) {
        let g = self.inner.read().await;
        for handle in g.values() {
            handle.stop();
        }
    }
}
