//! Gateway HTTP server (single port).

use crate::advisory::AdvisoryClient;
use crate::channels::{
    verify_signature, ChannelHandle, ChannelRegistry, InboundMessage, SlackChannel, SlackEnvelope,
};
use crate::config::{self, Config};
use crate::dispatch::RateLimitedDispatcher;
use crate::gateway::protocol::{ErrorBody, TestBackendRequest, TestBackendResponse};
use crate::llm::GeminiClient;
use crate::router::MessageRouter;
use crate::scheduler::ReplyScheduler;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Body of `GET /`.
pub const ROOT_TEXT: &str = "Slack Deploy Advisor Bot is running!";

const INBOUND_QUEUE: usize = 256;
const SLACK_SIGNATURE_HEADER: &str = "X-Slack-Signature";
const SLACK_TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
const SLACK_RETRY_HEADER: &str = "X-Slack-Retry-Num";

/// Shared state for the gateway handlers and the inbound processor.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub router: Arc<MessageRouter>,
    /// Shared with the router so `/test-backend` obeys the same spacing.
    pub dispatcher: Arc<RateLimitedDispatcher>,
    pub channel_registry: Arc<ChannelRegistry>,
    /// Sender for inbound channel messages (Slack event POSTs). Processor task receives.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    /// When Some, event requests must carry a valid Slack signature.
    pub signing_secret: Option<String>,
}

/// Route one inbound message through the channel it arrived on.
async fn process_inbound_message(state: GatewayState, msg: InboundMessage) {
    let Some(channel) = state.channel_registry.get(&msg.channel_id).await else {
        log::warn!(
            "inbound: no channel registered for {}, dropping message {}",
            msg.channel_id,
            msg.thread_anchor
        );
        return;
    };
    let outcome = state.router.handle(&msg, channel).await;
    log::info!(
        "inbound: message {} handled ({}, {} repl{} sent)",
        msg.thread_anchor,
        outcome.intent,
        outcome.replies_sent,
        if outcome.replies_sent == 1 { "y" } else { "ies" }
    );
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Requires a backend API key. Without a Slack bot token the server still runs but
/// inbound messages are dropped. Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let api_key = config::resolve_backend_api_key(&config)
        .context("no backend API key: set GEMINI_API_KEY or backend.apiKey")?;
    let backend = Arc::new(GeminiClient::new(
        api_key,
        config.backend.model.clone(),
        config.backend.base_url.clone(),
    ));
    log::info!("backend: gemini model {}", backend.model());
    let dispatcher = Arc::new(RateLimitedDispatcher::new(backend, config.dispatch));

    let scheduler = ReplyScheduler::new();
    let advisory = if config.advisory.enabled {
        Some(AdvisoryClient::new(config.advisory.base_url.clone()))
    } else {
        log::info!("advisory service disabled");
        None
    };
    let router = Arc::new(
        MessageRouter::new(config.router.clone(), dispatcher.clone(), scheduler.clone())
            .with_advisory(advisory),
    );

    let channel_registry = Arc::new(ChannelRegistry::new());
    match config::resolve_slack_token(&config) {
        Some(token) => {
            let slack = Arc::new(SlackChannel::new(Some(token), config.slack.api_base.clone()));
            channel_registry
                .register(slack.id().to_string(), slack)
                .await;
            log::info!("slack channel registered");
        }
        None => log::warn!("no slack bot token configured; inbound messages will be dropped"),
    }

    let signing_secret = config::resolve_slack_signing_secret(&config);
    if signing_secret.is_none() {
        log::warn!("no slack signing secret configured; event requests are not verified");
    }

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE);
    let state = GatewayState {
        config: Arc::new(config),
        router,
        dispatcher,
        channel_registry: channel_registry.clone(),
        inbound_tx,
        signing_secret,
    };

    {
        let state_inbound = state.clone();
        tokio::spawn(async move {
            while let Some(msg) = inbound_rx.recv().await {
                log::debug!(
                    "inbound: received message {} from {} in {}",
                    msg.thread_anchor,
                    msg.author_id,
                    msg.conversation_id
                );
                tokio::spawn(process_inbound_message(state_inbound.clone(), msg));
            }
        });
    }

    let port = state.config.gateway.port;
    let keep_alive_secs = state.config.gateway.keep_alive_secs;
    if keep_alive_secs > 0 {
        tokio::spawn(keep_alive(
            port,
            Duration::from_secs(keep_alive_secs),
            scheduler.shutdown_token(),
        ));
    }

    let bind_addr = format!("{}:{}", state.config.gateway.bind.trim(), port);
    let app = Router::new()
        .route("/", get(root_http))
        .route("/health", get(health_http))
        .route("/slack/events", post(slack_events))
        .route("/test-backend", post(test_backend))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(channel_registry, scheduler))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Periodically GET our own /health so idle hosting does not put the process to sleep.
async fn keep_alive(port: u16, every: Duration, cancel: CancellationToken) {
    let url = format!("http://127.0.0.1:{}/health", port);
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(every);
    // First tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => log::debug!("keep-alive: ping ok"),
            Ok(res) => log::warn!("keep-alive: ping returned {}", res.status()),
            Err(e) => log::warn!("keep-alive: ping failed: {}", e),
        }
    }
    log::debug!("keep-alive: stopped");
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Stops channel connectors, cancels delayed replies and keep-alive, then waits for them.
async fn shutdown_signal(channel_registry: Arc<ChannelRegistry>, scheduler: ReplyScheduler) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, stopping channels and draining delayed replies");

    channel_registry.stop_all().await;
    scheduler.shutdown().await;
}

/// GET / (and HEAD): liveness text.
async fn root_http() -> &'static str {
    ROOT_TEXT
}

/// GET /health: "OK" while the inbound processor is alive.
async fn health_http(State(state): State<GatewayState>) -> Response {
    if state.inbound_tx.is_closed() {
        log::warn!("health: inbound processor is gone");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response();
    }
    (StatusCode::OK, "OK").into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// POST /slack/events: Events API intake (url_verification challenge, message callbacks).
async fn slack_events(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref secret) = state.signing_secret {
        let verified = verify_signature(
            secret,
            header_str(&headers, SLACK_TIMESTAMP_HEADER),
            &body,
            header_str(&headers, SLACK_SIGNATURE_HEADER),
            chrono::Utc::now().timestamp(),
        );
        if let Err(e) = verified {
            log::warn!("slack: rejected event request: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(env) => env,
        Err(e) => {
            log::debug!("slack: undecodable event body: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            log::info!("slack: answering url verification");
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        SlackEnvelope::EventCallback { event } => {
            if headers.contains_key(SLACK_RETRY_HEADER) {
                log::debug!(
                    "slack: ignoring redelivery #{}",
                    header_str(&headers, SLACK_RETRY_HEADER)
                );
                return StatusCode::OK.into_response();
            }
            let Some(msg) = event.to_inbound() else {
                return StatusCode::OK.into_response();
            };
            if state.inbound_tx.send(msg).await.is_err() {
                log::warn!("slack: inbound queue closed");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
            StatusCode::OK.into_response()
        }
        SlackEnvelope::Other => StatusCode::OK.into_response(),
    }
}

/// POST /test-backend: one dispatch through the shared rate limiter.
async fn test_backend(State(state): State<GatewayState>, body: Bytes) -> Response {
    let req: TestBackendRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("Invalid JSON body")),
            )
                .into_response()
        }
    };
    let Some(message) = req.message.filter(|m| !m.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Message is required")),
        )
            .into_response();
    };
    let response = state.dispatcher.dispatch(&message).await;
    Json(TestBackendResponse { response }).into_response()
}
