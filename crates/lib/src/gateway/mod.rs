//! Gateway: HTTP server for Slack events, probes, and a backend test hook.
//!
//! One port serves everything. Slack event callbacks are acknowledged immediately and
//! queued; a processor task hands each message to the router on its own task.

mod protocol;
mod server;

pub use protocol::{ErrorBody, TestBackendRequest, TestBackendResponse};
pub use server::{run_gateway, ROOT_TEXT};
