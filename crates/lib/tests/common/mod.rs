//! Shared harness for gateway integration tests: free ports, fake Slack and Gemini
//! servers, and a helper that waits for the gateway to answer.

#![allow(dead_code)]

use advisor::config::Config;
use advisor::gateway;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// One chat.postMessage call seen by the fake Slack API.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub at: Instant,
    pub channel: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakeSlack {
    pub posts: Arc<Mutex<Vec<PostedMessage>>>,
    pub lookups: Arc<Mutex<Vec<String>>>,
}

impl FakeSlack {
    pub async fn start() -> (Self, String) {
        let fake = Self::default();
        let app = Router::new()
            .route("/chat.postMessage", post(post_message))
            .route("/users.info", get(users_info))
            .with_state(fake.clone());
        let base = serve(app).await;
        (fake, base)
    }

    pub fn posts(&self) -> Vec<PostedMessage> {
        self.posts.lock().unwrap().clone()
    }

    /// Wait until at least `n` messages were posted (or panic after `timeout`).
    pub async fn wait_for_posts(&self, n: usize, timeout: Duration) -> Vec<PostedMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            let posts = self.posts();
            if posts.len() >= n {
                return posts;
            }
            if Instant::now() > deadline {
                panic!("expected {} slack posts within {:?}, got {:?}", n, timeout, posts);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn post_message(State(fake): State<FakeSlack>, Json(body): Json<Value>) -> Json<Value> {
    fake.posts.lock().unwrap().push(PostedMessage {
        at: Instant::now(),
        channel: body["channel"].as_str().unwrap_or_default().to_string(),
        text: body["text"].as_str().unwrap_or_default().to_string(),
        thread_ts: body["thread_ts"].as_str().map(str::to_string),
    });
    Json(json!({ "ok": true }))
}

async fn users_info(
    State(fake): State<FakeSlack>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let user = params.get("user").cloned().unwrap_or_default();
    fake.lookups.lock().unwrap().push(user);
    Json(json!({ "ok": true, "user": { "tz": "UTC" } }))
}

/// Gemini stand-in: answers every request with one SSE event echoing the prompt.
pub async fn start_fake_gemini() -> String {
    let app = Router::new().fallback(gemini_stream);
    serve(app).await
}

async fn gemini_stream(body: Bytes) -> impl IntoResponse {
    let request: Value = serde_json::from_slice(&body).unwrap_or_default();
    let prompt = request["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();
    let event = json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": format!("echo: {}", prompt) }] } }]
    });
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        format!("data: {}\r\n\r\n", event),
    )
}

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const MEDIA_URL: &str = "https://media.test/no-friday.gif";
pub const FOLLOW_UP_MS: u64 = 300;

/// Config wired to the fakes, with short spacing so tests stay quick.
pub fn test_config(port: u16, gemini: &str, slack: Option<&str>) -> Config {
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.gateway.keep_alive_secs = 0;
    config.backend.api_key = Some("test-key".to_string());
    config.backend.base_url = Some(gemini.to_string());
    config.dispatch.min_spacing_ms = 100;
    config.dispatch.base_delay_ms = 0;
    config.advisory.enabled = false;
    config.router.follow_up_delay_ms = FOLLOW_UP_MS;
    config.router.media_url = MEDIA_URL.to_string();
    config.router.seed = Some(3);
    if let Some(base) = slack {
        config.slack.bot_token = Some("xoxb-test".to_string());
        config.slack.signing_secret = Some(SIGNING_SECRET.to_string());
        config.slack.api_base = Some(base.to_string());
    }
    config
}

/// Spawn the gateway and wait until `GET /` answers. The server task is left running.
pub async fn start_gateway(config: Config) -> String {
    let port = config.gateway.port;
    tokio::spawn(async move {
        if let Err(e) = gateway::run_gateway(config).await {
            eprintln!("gateway exited: {:#}", e);
        }
    });
    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(format!("{}/", base)).send().await {
            Ok(resp) if resp.status().is_success() => return base,
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on {} did not come up within 5s; last error: {:?}", base, last_err);
}

/// `X-Slack-Request-Timestamp` and `X-Slack-Signature` for `body`, signed now.
pub fn slack_headers(body: &str) -> (String, String) {
    let ts = chrono::Utc::now().timestamp().to_string();
    let mut mac = Hmac::<Sha256>::new_from_slice(SIGNING_SECRET.as_bytes()).expect("hmac key");
    mac.update(format!("v0:{}:{}", ts, body).as_bytes());
    let sig = format!("v0={}", hex::encode(mac.finalize().into_bytes()));
    (ts, sig)
}

/// POST a signed Events API body.
pub async fn post_event(base: &str, body: &Value) -> reqwest::Response {
    let body = body.to_string();
    let (ts, sig) = slack_headers(&body);
    reqwest::Client::new()
        .post(format!("{}/slack/events", base))
        .header("Content-Type", "application/json")
        .header("X-Slack-Request-Timestamp", ts)
        .header("X-Slack-Signature", sig)
        .body(body)
        .send()
        .await
        .expect("post event")
}

pub fn message_event(text: &str, ts: &str) -> Value {
    json!({
        "type": "event_callback",
        "event": {
            "type": "message",
            "user": "U123",
            "text": text,
            "channel": "C42",
            "ts": ts
        }
    })
}

pub const ADVISORY_TEXT: &str = "Nope, not today 🙅";

/// shouldideploy.today stand-in: `GET /api/slack?tz=..` → fixed text.
pub async fn start_fake_advisory() -> String {
    let app = Router::new().route(
        "/api/slack",
        get(|| async { Json(json!({ "text": ADVISORY_TEXT })) }),
    );
    serve(app).await
}
