//! Outbound reply produced by the router.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub text: String,
    pub thread_anchor: String,
    /// Send no earlier than this after the reply is produced.
    pub delay: Option<Duration>,
}

impl OutboundReply {
    pub fn threaded(text: impl Into<String>, thread_anchor: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thread_anchor: thread_anchor.into(),
            delay: None,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
