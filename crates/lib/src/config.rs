//! Configuration types and loading.
//!
//! Config is loaded from an optional JSON file (e.g. `~/.relay/config.json`), then
//! environment variables override individual fields. Loaded once at startup and
//! treated as read-only afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default webhook verification secret when neither config nor env sets one.
pub const DEFAULT_VERIFY_TOKEN: &str = "confirmacaowebhookguara";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings and the webhook verification secret.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Completion API settings (key, model candidates, token budget).
    #[serde(default)]
    pub llm: LlmConfig,

    /// WhatsApp Cloud API send settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// Gateway bind, port, and webhook verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Listening port (default 5000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the relay must be reachable by the platform).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Secret echoed back by the provider during the GET /webhook handshake.
    /// Overridden by WHATSAPP_VERIFY_TOKEN env.
    #[serde(default = "default_verify_token")]
    pub verify_token: String,
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// API key. Overridden by ANTHROPIC_API_KEY env. When absent, completion fails fast.
    pub api_key: Option<String>,

    /// API base URL (default https://api.anthropic.com). Overridden by ANTHROPIC_API_BASE env.
    pub base_url: Option<String>,

    /// Model ids tried in order until one succeeds. Most capable first.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Output token budget per completion call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout for completion calls, in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API. Overridden by WHATSAPP_TOKEN env.
    pub token: Option<String>,

    /// Sender phone number id (part of the send URL). Overridden by WHATSAPP_PHONE_NUMBER_ID env.
    pub phone_number_id: Option<String>,

    /// Graph API base URL (default https://graph.facebook.com). Overridden by WHATSAPP_API_BASE env.
    pub api_base: Option<String>,

    /// Graph API version path segment (default "v18.0").
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout for send calls, in seconds.
    #[serde(default = "default_whatsapp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_verify_token() -> String {
    DEFAULT_VERIFY_TOKEN.to_string()
}

fn default_models() -> Vec<String> {
    vec![
        "claude-3-5-sonnet-20241022".to_string(),
        "claude-3-5-sonnet-20240620".to_string(),
        "claude-3-sonnet-20240229".to_string(),
    ]
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

fn default_whatsapp_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            verify_token: default_verify_token(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            models: default_models(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            token: None,
            phone_number_id: None,
            api_base: None,
            api_version: default_api_version(),
            timeout_secs: default_whatsapp_timeout_secs(),
        }
    }
}

/// Trimmed, non-empty value or None.
fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides using `lookup` for variable values. Blank values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).as_deref().and_then(non_empty);

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = get("ANTHROPIC_API_BASE") {
            self.llm.base_url = Some(base);
        }
        if let Some(token) = get("WHATSAPP_TOKEN") {
            self.whatsapp.token = Some(token);
        }
        if let Some(id) = get("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = Some(id);
        }
        if let Some(base) = get("WHATSAPP_API_BASE") {
            self.whatsapp.api_base = Some(base);
        }
        if let Some(token) = get("WHATSAPP_VERIFY_TOKEN") {
            self.gateway.verify_token = token;
        }
        if let Some(port) = get("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.gateway.port = p,
                Err(_) => log::warn!("ignoring invalid PORT value: {}", port),
            }
        }
    }

    /// The API key, if configured and non-blank.
    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Short masked form of a secret for logs (first few characters only).
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}...", prefix)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or RELAY_CONFIG_PATH / default) and apply env overrides.
/// Missing file => defaults. Returns the config and the path that was used.
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
    config.apply_env();
    Ok((config, path))
}
