//! Deploy advisor core library: intent routing, Friday oracle, canned replies,
//! the rate-limited model dispatcher, the Slack channel, and the gateway used by the CLI.

pub mod advisory;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod emoji;
pub mod gateway;
pub mod intent;
pub mod llm;
pub mod oracle;
pub mod responses;
pub mod router;
pub mod scheduler;
