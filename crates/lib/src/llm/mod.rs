//! Generative-text backend abstraction and the Gemini client.
//!
//! The dispatcher only needs "system framing + prompt in, one string out", so the
//! trait is that narrow. Streaming is an implementation detail of each backend.

mod gemini;

pub use gemini::{GeminiClient, DEFAULT_MODEL};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Backend asked us to slow down (HTTP 429 or RESOURCE_EXHAUSTED).
    #[error("backend throttled: {0}")]
    Throttled(String),
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend api error: {0}")]
    Api(String),
    #[error("backend returned undecodable data: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the dispatcher should back off and retry.
    pub fn is_throttling(&self) -> bool {
        match self {
            BackendError::Throttled(_) => true,
            BackendError::Request(e) => {
                e.status().map(|s| s.as_u16()) == Some(429)
            }
            BackendError::Api(msg) => msg.contains("429") || msg.contains("RESOURCE_EXHAUSTED"),
            BackendError::Decode(_) => false,
        }
    }
}

/// One-shot text generation.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Generate a reply for `prompt` under the `system` framing. Streamed fragments are
    /// concatenated into the returned string.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, BackendError>;
}
