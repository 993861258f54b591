//! Inbound message from a channel: delivered to the gateway for routing.

/// A chat message to be classified and answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel_id: String,
    /// Platform conversation (e.g. Slack channel id).
    pub conversation_id: String,
    pub author_id: String,
    pub text: String,
    /// Message timestamp; replies are threaded under it.
    pub thread_anchor: String,
    /// Author's civil timezone when the platform already supplied it.
    pub timezone: Option<String>,
}
