//! Server configuration with environment variable overrides.
//!
//! Loading flow: start from compiled defaults, then apply `QUILL_*` (and
//! `OPENAI_*`) environment overrides. Invalid values are logged and
//! ignored, falling back to the default.

use serde::{Deserialize, Serialize};

/// Configuration for the Quill server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `8080`, `0` for auto-assign).
    pub port: u16,
    /// Upstream API key. Absent means chat requests fail with a
    /// configuration error.
    pub openai_api_key: Option<String>,
    /// Upstream base URL.
    pub openai_base_url: String,
    /// Model used when a conversation does not pin one.
    pub default_model: String,
    /// Static API tokens in `token:user:role` form.
    pub api_tokens: Vec<String>,
    /// Minimum log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".into(),
            default_model: quill_core::constants::DEFAULT_MODEL.into(),
            api_tokens: Vec::new(),
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `QUILL_*` / `OPENAI_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = read_env_string("QUILL_HOST") {
            self.host = v;
        }
        if let Some(v) = read_env_u16("QUILL_PORT", 0, 65535) {
            self.port = v;
        }
        if let Some(v) = read_env_string("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = read_env_string("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = read_env_string("QUILL_DEFAULT_MODEL") {
            self.default_model = v;
        }
        if let Some(v) = read_env_string("QUILL_API_TOKENS") {
            self.api_tokens = v.split(',').map(str::trim).map(String::from).collect();
        }
        if let Some(v) = read_env_string("QUILL_LOG_LEVEL") {
            self.log_level = v;
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
#[must_use]
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_address() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn default_upstream() {
        let cfg = ServerConfig::default();
        assert!(cfg.openai_api_key.is_none());
        assert_eq!(cfg.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.default_model, "gpt-4.1-mini");
    }

    #[test]
    fn parse_u16_accepts_in_range() {
        assert_eq!(parse_u16_range("8080", 0, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 0, 65535), Some(0));
    }

    #[test]
    fn parse_u16_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_u16_range("80", 1024, 65535), None);
        assert_eq!(parse_u16_range("not-a-port", 0, 65535), None);
        assert_eq!(parse_u16_range("-1", 0, 65535), None);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.default_model, cfg.default_model);
    }
}
