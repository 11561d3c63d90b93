//! Configuration module for environment variable parsing.
//!
//! Everything is resolved once at startup. Each value follows the same
//! layering: explicit env value, then a value derived from other settings,
//! then a hard-coded default. The webhook base URL has no default; routes
//! that need it fail with a configuration error when it is missing.

use std::env;
use std::time::Duration;
use tracing::warn;

/// Env variable holding the webhook base URL (e.g. `https://host/webhook`).
pub const N8N_WEBHOOK_VAR: &str = "N8N_WEBHOOK";

/// Env variable overriding the full education chat webhook URL.
pub const N8N_WEBHOOK_CHAT_VAR: &str = "N8N_WEBHOOK_CHAT";

const PRODUCTION_API_URL: &str = "https://api.nsgintelligence.com";
const DEVELOPMENT_API_URL: &str = "http://localhost:4000";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Deployment environment name (`production`, `development`, ...)
    pub app_env: String,

    /// Base URL of the API server (PDF ingestion lives there)
    pub api_url: String,

    /// Webhook base URL. `None` when unset or blank.
    pub n8n_webhook: Option<String>,

    /// Full URL of the education chat webhook, if configured or derivable
    pub n8n_webhook_chat: Option<String>,

    /// Timeout applied to every downstream call, in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum accepted inbound body size in bytes
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            app_env: "development".to_string(),
            api_url: DEVELOPMENT_API_URL.to_string(),
            n8n_webhook: None,
            n8n_webhook_chat: None,
            request_timeout_ms: 30_000,
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let app_env = non_empty_var("APP_ENV").unwrap_or(defaults.app_env);

        let api_url = non_empty_var("API_URL")
            .unwrap_or_else(|| derive_api_url(&app_env).to_string());

        let n8n_webhook = non_empty_var(N8N_WEBHOOK_VAR).map(|v| trim_trailing_slash(&v));

        let n8n_webhook_chat = non_empty_var(N8N_WEBHOOK_CHAT_VAR)
            .or_else(|| derive_chat_url(n8n_webhook.as_deref()));

        Config {
            port: parse_or("PORT", defaults.port),
            app_env,
            api_url: trim_trailing_slash(&api_url),
            n8n_webhook,
            n8n_webhook_chat,
            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            max_body_bytes: parse_or("MAX_BODY_BYTES", defaults.max_body_bytes),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn derive_api_url(app_env: &str) -> &'static str {
    if app_env == "production" {
        PRODUCTION_API_URL
    } else {
        DEVELOPMENT_API_URL
    }
}

fn derive_chat_url(base: Option<&str>) -> Option<String> {
    base.map(|b| format!("{}/nsg-education-chat", b))
}

fn trim_trailing_slash(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

/// Read an env variable, trimmed. Blank values count as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a numeric env variable, falling back to `default` when absent or invalid.
fn parse_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match non_empty_var(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}
