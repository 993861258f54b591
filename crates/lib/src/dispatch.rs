//! Rate-limited dispatch to the generative-text backend.
//!
//! One dispatcher (and so one [`DispatchState`]) is shared by every caller in the
//! process. Before each send a caller takes the state lock, waits out whichever is
//! longer of the remaining minimum spacing and its current backoff delay, stamps
//! `last_request`, and releases the lock. Holding the lock across that wait
//! serializes senders, so no two sends are ever closer than `min_spacing` even
//! when many messages are in flight.
//!
//! Throttling errors are retried with exponential backoff up to `max_retries`;
//! every other failure (and retry exhaustion) resolves to [`FALLBACK_TEXT`].
//! `dispatch` never returns an error.

use crate::config::DispatchConfig;
use crate::llm::LlmBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// System framing sent with every prompt.
pub const SYSTEM_FRAMING: &str = "You are a sassy DevOps assistant who LOVES to roast Friday deployments. \
Respond in ONE line only, be direct and sassy, include 1-2 relevant emojis. \
For Friday deployments, roast them hard! For other topics, be sassy but helpful.";

/// Returned when the backend cannot produce an answer.
pub const FALLBACK_TEXT: &str = "I'm a bit busy right now, but here's what I know about deployments:\n\
1. Avoid Friday deployments 🚫\n\
2. Always have a rollback plan 🔄\n\
3. Test thoroughly before deploying ✅\n\
Try asking again in a moment! 🤖";

/// `min(base * 2^attempt, max)`.
pub fn backoff_delay(policy: &DispatchConfig, attempt_index: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt_index).unwrap_or(u64::MAX);
    let ms = policy
        .base_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(ms)
}

/// One attempt within a logical dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_index: u32,
    pub computed_delay: Duration,
}

impl RetryAttempt {
    pub fn new(attempt_index: u32, policy: &DispatchConfig) -> Self {
        Self {
            attempt_index,
            computed_delay: backoff_delay(policy, attempt_index),
        }
    }
}

/// Process-wide timestamp of the most recent send. `None` until the first send.
#[derive(Debug, Default)]
pub struct DispatchState {
    last_request: Option<Instant>,
}

/// Owns the shared backend connection and enforces spacing and backoff.
pub struct RateLimitedDispatcher {
    backend: Arc<dyn LlmBackend>,
    policy: DispatchConfig,
    state: Mutex<DispatchState>,
}

impl RateLimitedDispatcher {
    pub fn new(backend: Arc<dyn LlmBackend>, policy: DispatchConfig) -> Self {
        Self {
            backend,
            policy,
            state: Mutex::new(DispatchState::default()),
        }
    }

    /// Instant of the most recent send, if any.
    pub async fn last_request(&self) -> Option<Instant> {
        self.state.lock().await.last_request
    }

    /// Ask the backend about `prompt`. Always resolves to text.
    pub async fn dispatch(&self, prompt: &str) -> String {
        let mut attempt = RetryAttempt::new(0, &self.policy);
        loop {
            self.wait_turn(&attempt).await;
            log::debug!(
                "dispatch: sending to {} (attempt {})",
                self.backend.name(),
                attempt.attempt_index
            );
            match self.backend.generate(SYSTEM_FRAMING, prompt).await {
                Ok(text) => return text,
                Err(e) if e.is_throttling() && attempt.attempt_index < self.policy.max_retries => {
                    attempt = RetryAttempt::new(attempt.attempt_index + 1, &self.policy);
                    log::warn!(
                        "dispatch: rate limited ({}), retrying in at least {}ms",
                        e,
                        attempt.computed_delay.as_millis()
                    );
                }
                Err(e) => {
                    if e.is_throttling() {
                        log::warn!(
                            "dispatch: still rate limited after {} retries, using fallback",
                            attempt.attempt_index
                        );
                    } else {
                        log::warn!("dispatch: backend failed: {}, using fallback", e);
                    }
                    return FALLBACK_TEXT.to_string();
                }
            }
        }
    }

    /// Wait until this attempt may send, then stamp the send time. Returns the wait.
    async fn wait_turn(&self, attempt: &RetryAttempt) -> Duration {
        let mut state = self.state.lock().await;
        let spacing_left = match state.last_request {
            Some(last) => self
                .policy
                .min_spacing()
                .saturating_sub(Instant::now().saturating_duration_since(last)),
            None => Duration::ZERO,
        };
        let wait = spacing_left.max(attempt.computed_delay);
        if !wait.is_zero() {
            log::debug!("dispatch: waiting {}ms before request", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
        state.last_request = Some(Instant::now());
        wait
    }
}
