//! Gemini API client (streamGenerateContent over SSE).

use crate::llm::{BackendError, LlmBackend};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Client for the Generative Language API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            base_url,
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /v1beta/models/{model}:streamGenerateContent?alt=sse and concatenate the text parts.
    pub async fn generate_stream(&self, system: &str, prompt: &str) -> Result<String, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let body = GenerateRequest::new(system, prompt);
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(BackendError::Throttled(format!("{} {}", status, body)));
            }
            return Err(BackendError::Api(format!("{} {}", status, body)));
        }
        let mut stream = res.bytes_stream();
        let mut acc = SseAccumulator::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(BackendError::Request)?;
            acc.push(&chunk)?;
        }
        acc.finish()
    }
}

#[async_trait]
impl LlmBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, BackendError> {
        self.generate_stream(system, prompt).await
    }
}

/// Buffers raw SSE bytes and collects the text of each `data:` event.
#[derive(Debug, Default)]
pub(crate) struct SseAccumulator {
    buffer: Vec<u8>,
    text: String,
}

impl SseAccumulator {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        self.buffer.extend_from_slice(bytes);
        while let Some(i) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..i).collect();
            self.buffer.drain(..1);
            let line = String::from_utf8_lossy(&line_bytes);
            self.handle_line(line.trim())?;
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<(), BackendError> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }
        let event: StreamEvent =
            serde_json::from_str(data).map_err(|e| BackendError::Decode(e.to_string()))?;
        if let Some(err) = event.error {
            let msg = format!("{} {}", err.status.unwrap_or_default(), err.message);
            if err.code == Some(429) || msg.contains("RESOURCE_EXHAUSTED") {
                return Err(BackendError::Throttled(msg));
            }
            return Err(BackendError::Api(msg));
        }
        for candidate in event.candidates.iter().take(1) {
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    if let Some(t) = &part.text {
                        self.text.push_str(t);
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<String, BackendError> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.handle_line(line.trim())?;
        }
        if self.text.trim().is_empty() {
            return Err(BackendError::Api("empty response".to_string()));
        }
        Ok(self.text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn new(system: &str, prompt: &str) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.to_string()),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "text/plain".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
            })
        )
    }

    #[test]
    fn concatenates_fragments_across_chunk_boundaries() {
        let body = format!("{}{}{}", event("Friday? "), event("Absolutely "), event("not 🔥"));
        let bytes = body.as_bytes();
        let mut acc = SseAccumulator::default();
        for chunk in bytes.chunks(7) {
            acc.push(chunk).unwrap();
        }
        assert_eq!(acc.finish().unwrap(), "Friday? Absolutely not 🔥");
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut acc = SseAccumulator::default();
        acc.push(b": keep-alive\n").unwrap();
        acc.push(b"event: message\n").unwrap();
        acc.push(event("hi").as_bytes()).unwrap();
        assert_eq!(acc.finish().unwrap(), "hi");
    }

    #[test]
    fn trailing_event_without_newline_is_kept() {
        let mut acc = SseAccumulator::default();
        let body = event("tail");
        acc.push(body.trim_end().as_bytes()).unwrap();
        assert_eq!(acc.finish().unwrap(), "tail");
    }

    #[test]
    fn in_stream_quota_error_is_throttling() {
        let mut acc = SseAccumulator::default();
        let line = "data: {\"error\":{\"code\":429,\"message\":\"quota\",\"status\":\"RESOURCE_EXHAUSTED\"}}\n";
        let err = acc.push(line.as_bytes()).unwrap_err();
        assert!(matches!(err, BackendError::Throttled(_)));
        assert!(err.is_throttling());
    }

    #[test]
    fn empty_stream_is_an_error() {
        let acc = SseAccumulator::default();
        let err = acc.finish().unwrap_err();
        assert!(!err.is_throttling());
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(GenerateRequest::new("be sassy", "hello")).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be sassy");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["responseMimeType"], "text/plain");
        assert!(body["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn default_model_and_trimmed_base() {
        let c = GeminiClient::new("k".into(), Some("  ".into()), Some("http://x/".into()));
        assert_eq!(c.model(), DEFAULT_MODEL);
        assert_eq!(c.base_url, "http://x");
    }
}
