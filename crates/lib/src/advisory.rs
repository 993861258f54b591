//! Secondary advisory service (shouldideploy.today): `GET /api/slack?tz=...` → `{ "text": ... }`.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("advisory returned {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct AdvisoryResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone)]
pub struct AdvisoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl AdvisoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Advice for `timezone`. `Ok(None)` when the service answered without usable text.
    pub async fn advice(&self, timezone: &str) -> Result<Option<String>, AdvisoryError> {
        let url = format!("{}/api/slack", self.base_url);
        let res = self
            .client
            .get(&url)
            .query(&[("tz", timezone)])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AdvisoryError::Status(res.status()));
        }
        let data: AdvisoryResponse = res.json().await?;
        Ok(data.text.filter(|t| !t.trim().is_empty()))
    }
}
