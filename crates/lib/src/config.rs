//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.advisor/config.json`) and environment.
//! Every field has a default so an empty `{}` (or a missing file) is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generative-text backend (Gemini) settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Spacing and retry policy for backend dispatch.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Slack channel credentials.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Secondary advisory service.
    #[serde(default)]
    pub advisory: AdvisoryConfig,

    /// Message routing knobs.
    #[serde(default)]
    pub router: RouterConfig,
}

/// Gateway bind, port, and keep-alive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Interval for pinging our own /health. 0 disables the keep-alive task.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_keep_alive_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Backend model and credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Model id (default "gemini-2.0-flash").
    pub model: Option<String>,
    /// API base URL; defaults to the public Generative Language endpoint.
    pub base_url: Option<String>,
    /// API key. Overridden by GEMINI_API_KEY env.
    pub api_key: Option<String>,
}

/// Dispatch timing policy. Defaults match the documented constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Retries after the first attempt when the backend throttles.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_min_spacing_ms() -> u64 {
    5_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: default_min_spacing_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl DispatchConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

/// Slack bot credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (xoxb-...). Overridden by SLACK_BOT_TOKEN env.
    pub bot_token: Option<String>,
    /// Signing secret for Events API requests. Overridden by SLACK_SIGNING_SECRET env.
    /// When absent, inbound requests are not signature-checked.
    pub signing_secret: Option<String>,
    /// Web API base (tests point this at a local server).
    pub api_base: Option<String>,
}

/// Advisory service (shouldideploy.today style).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_advisory_base_url")]
    pub base_url: String,
}

fn default_true() -> bool {
    true
}

fn default_advisory_base_url() -> String {
    "https://shouldideploy.today".to_string()
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_advisory_base_url(),
        }
    }
}

/// Routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Civil timezone used when none can be resolved (default "UTC").
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Delay before the media follow-up on an explicit Friday question.
    #[serde(default = "default_follow_up_delay_ms")]
    pub follow_up_delay_ms: u64,
    #[serde(default = "default_media_url")]
    pub media_url: String,
    /// Seed for template/emoji selection. Absent means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_follow_up_delay_ms() -> u64 {
    1_000
}

fn default_media_url() -> String {
    "https://media.giphy.com/media/d10dMmzqCYqQ0/giphy.gif".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            follow_up_delay_ms: default_follow_up_delay_ms(),
            media_url: default_media_url(),
            seed: None,
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the backend API key: env GEMINI_API_KEY overrides config.
pub fn resolve_backend_api_key(config: &Config) -> Option<String> {
    env_non_empty("GEMINI_API_KEY").or_else(|| config_non_empty(config.backend.api_key.as_ref()))
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_slack_token(config: &Config) -> Option<String> {
    env_non_empty("SLACK_BOT_TOKEN").or_else(|| config_non_empty(config.slack.bot_token.as_ref()))
}

/// Resolve the Slack signing secret: env SLACK_SIGNING_SECRET overrides config.
pub fn resolve_slack_signing_secret(config: &Config) -> Option<String> {
    env_non_empty("SLACK_SIGNING_SECRET")
        .or_else(|| config_non_empty(config.slack.signing_secret.as_ref()))
}

/// Apply PORT env over the configured gateway port. Invalid values are ignored.
pub fn apply_port_env(config: &mut Config) {
    if let Some(p) = env_non_empty("PORT") {
        match p.parse::<u16>() {
            Ok(port) => config.gateway.port = port,
            Err(_) => log::warn!("config: ignoring invalid PORT value {:?}", p),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ADVISOR_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".advisor").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or default path). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_port_env(&mut config);
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_documented_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(config.dispatch, DispatchConfig::default());
        assert_eq!(config.dispatch.min_spacing_ms, 5_000);
        assert_eq!(config.dispatch.base_delay_ms, 1_000);
        assert_eq!(config.dispatch.max_delay_ms, 30_000);
        assert_eq!(config.dispatch.max_retries, 3);
        assert_eq!(config.router.default_timezone, "UTC");
        assert_eq!(config.router.follow_up_delay_ms, 1_000);
        assert!(config.advisory.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "dispatch": { "minSpacingMs": 250 }, "router": { "seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.dispatch.min_spacing_ms, 250);
        assert_eq!(config.dispatch.max_retries, 3);
        assert_eq!(config.router.seed, Some(7));
        assert_eq!(config.router.media_url, default_media_url());
    }

    #[test]
    fn missing_file_is_default_config() {
        let path = std::env::temp_dir().join("advisor-config-test-does-not-exist.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.router.default_timezone, "UTC");
    }

    #[test]
    fn blank_config_values_are_ignored() {
        let mut config = Config::default();
        config.slack.bot_token = Some("   ".to_string());
        assert_eq!(config_non_empty(config.slack.bot_token.as_ref()), None);
    }
}
