//! Environment-driven service configuration.
//!
//! Everything is read once at startup, after `.env` loading. A missing or
//! placeholder API key is normalized to `None`; the server then starts in
//! degraded mode (patch/export work, generation reports the missing
//! credential).

use std::env;

/// Sample value shipped in `.env` templates, treated the same as unset.
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic API key, `None` when unset or still the placeholder.
    pub api_key: Option<String>,
    /// Model identifier for both generation stages.
    pub model: String,
    /// Provider base URL.
    pub base_url: String,
    /// Listen address.
    pub addr: String,
    /// Directory receiving exported decks.
    pub export_dir: String,
    /// Cap on concurrent per-slide body calls.
    pub concurrency: usize,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            api_key: sanitize_api_key(env::var("ANTHROPIC_API_KEY").ok()),
            model: env_or("DECKGEN_MODEL", crate::generate::DEFAULT_MODEL),
            base_url: env_or("DECKGEN_BASE_URL", "https://api.anthropic.com"),
            addr: env_or("DECKGEN_ADDR", "127.0.0.1:8000"),
            export_dir: env_or("DECKGEN_EXPORT_DIR", "exports"),
            concurrency: env::var("DECKGEN_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&c: &usize| c > 0)
                .unwrap_or(4),
        }
    }
}

fn sanitize_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
