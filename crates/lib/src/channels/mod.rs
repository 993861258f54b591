//! Chat channels (Slack).
//!
//! Channel trait and registry so the gateway can stop connectors on shutdown and the
//! router can deliver threaded replies and look up author timezones.

mod inbound;
mod outbound;
mod registry;
mod slack;

pub use inbound::InboundMessage;
pub use outbound::OutboundReply;
pub use registry::{ChannelError, ChannelHandle, ChannelRegistry};
pub use slack::{
    verify_signature, SignatureError, SlackChannel, SlackEnvelope, SlackEvent, SLACK_CHANNEL_ID,
};
