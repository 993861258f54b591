//! Slack channel: Events API payloads in, Web API (chat.postMessage, users.info) out.

use crate::channels::inbound::InboundMessage;
use crate::channels::registry::{ChannelError, ChannelHandle};
use crate::channels::OutboundReply;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};

const SLACK_API_BASE: &str = "https://slack.com/api";
pub const SLACK_CHANNEL_ID: &str = "slack";
/// Requests whose timestamp is further than this from now are rejected.
const MAX_SIGNATURE_AGE_SECS: u64 = 60 * 5;

type HmacSha256 = Hmac<Sha256>;

/// Top-level Events API request body.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: SlackEvent },
    #[serde(other)]
    Other,
}

/// The `event` object of an event_callback. Only the fields we route on.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl SlackEvent {
    /// Plain user messages become inbound messages; edits, joins, and bot posts do not.
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        if self.typ != "message" || self.subtype.is_some() || self.bot_id.is_some() {
            return None;
        }
        let text = self.text.as_deref().filter(|t| !t.trim().is_empty())?;
        let ts = self.ts.clone()?;
        Some(InboundMessage {
            channel_id: SLACK_CHANNEL_ID.to_string(),
            conversation_id: self.channel.clone()?,
            author_id: self.user.clone()?,
            text: text.to_string(),
            thread_anchor: self.thread_ts.clone().unwrap_or(ts),
            timezone: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing or malformed signature headers")]
    Malformed,
    #[error("request timestamp too old")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Check `X-Slack-Signature` (`v0=<hex hmac>`) against `v0:{timestamp}:{body}`.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_secs: i64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::Malformed)?;
    let age = now_secs
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .ok_or(SignatureError::Stale)?;
    if age > MAX_SIGNATURE_AGE_SECS {
        return Err(SignatureError::Stale);
    }
    let provided = signature
        .trim()
        .strip_prefix("v0=")
        .and_then(|h| hex::decode(h).ok())
        .ok_or(SignatureError::Malformed)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(b"v0:");
    mac.update(timestamp.trim().as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    tz: Option<String>,
}

/// Slack Web API connector.
pub struct SlackChannel {
    id: String,
    token: Option<String>,
    api_base: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(token: Option<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        Self {
            id: SLACK_CHANNEL_ID.to_string(),
            token,
            api_base,
            running: AtomicBool::new(true),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn token(&self) -> Result<&str, ChannelError> {
        self.token
            .as_deref()
            .ok_or(ChannelError::NotConfigured("slack bot token"))
    }

    /// chat.postMessage, threaded when `thread_ts` is non-empty.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ChannelError> {
        if !self.running() {
            return Err(ChannelError::Stopped);
        }
        let token = self.token()?;
        let url = format!("{}/chat.postMessage", self.api_base);
        let mut body = serde_json::json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts.filter(|t| !t.is_empty()) {
            body["thread_ts"] = serde_json::Value::String(ts.to_string());
        }
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!(
                "chat.postMessage failed: {} {}",
                status, body
            )));
        }
        let data: ApiResponse = res.json().await?;
        if !data.ok {
            return Err(ChannelError::Api(format!(
                "chat.postMessage returned ok: false ({})",
                data.error.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// users.info → `user.tz`.
    pub async fn users_info_timezone(&self, user: &str) -> Result<Option<String>, ChannelError> {
        let token = self.token()?;
        let url = format!("{}/users.info", self.api_base);
        let res = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("user", user)])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("users.info failed: {} {}", status, body)));
        }
        let data: UsersInfoResponse = res.json().await?;
        if !data.ok {
            return Err(ChannelError::Api(format!(
                "users.info returned ok: false ({})",
                data.error.unwrap_or_default()
            )));
        }
        Ok(data
            .user
            .and_then(|u| u.tz)
            .filter(|tz| !tz.trim().is_empty()))
    }
}

#[async_trait]
impl ChannelHandle for SlackChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        log::info!("slack channel: stopped");
    }

    async fn send_reply(
        &self,
        conversation_id: &str,
        reply: &OutboundReply,
    ) -> Result<(), ChannelError> {
        self.post_message(conversation_id, &reply.text, Some(&reply.thread_anchor))
            .await
    }

    async fn user_timezone(&self, user_id: &str) -> Result<Option<String>, ChannelError> {
        self.users_info_timezone(user_id).await
    }
}
