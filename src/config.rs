//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `SWCTL_API_KEY`, `SWCTL_LISTEN`,
//!    `SWCTL_CALLBACK_URL`
//! 2. **Config file** — path via `--config <path>`, or `swctl.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:9301"
//! max_upload_size = 16777216  # 16 MB
//!
//! [auth]
//! api_key = "your-secret-key"
//!
//! [sync]
//! interval_secs = 30
//! request_timeout_secs = 10
//! session_ttl_secs = 3600
//!
//! [callback]
//! # Externally reachable base URL the switches push schema bundles to.
//! base_url = "http://mgmt.example.com:9301"
//!
//! [schema]
//! token_ttl_secs = 600
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:9301`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum accepted size in bytes for an inbound schema upload (default 16 MB).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

/// Authentication settings for the management API.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared Bearer token. Override with `SWCTL_API_KEY` env var.
    /// Defaults to `"change-me"` which triggers a startup warning.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

/// Reconciliation cadence and outbound-call limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds between full-fleet sync passes (default 30).
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Per-call timeout for all outbound switch requests in seconds (default 10).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// TTL requested for switch session tokens in seconds (default 3600).
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

/// Inbound upload callback settings.
///
/// Switches push schema bundles back to this server over HTTP. `base_url`
/// must be reachable *from the switches*, so the loopback default only works
/// for local development — production deployments set it explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackConfig {
    /// Externally reachable base URL of this server. Override with
    /// `SWCTL_CALLBACK_URL`.
    #[serde(default = "default_callback_base_url")]
    pub base_url: String,
}

/// Schema retrieval settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Lifetime of an unconsumed upload token in seconds (default 600).
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:9301".to_string()
}
fn default_max_upload_size() -> usize {
    16 * 1024 * 1024 // 16 MB
}
fn default_api_key() -> String {
    "change-me".to_string()
}
fn default_sync_interval() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    10
}
fn default_session_ttl() -> u64 {
    3600
}
fn default_callback_base_url() -> String {
    "http://127.0.0.1:9301".to_string()
}
fn default_token_ttl() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            request_timeout_secs: default_request_timeout(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            base_url: default_callback_base_url(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise looks
    /// for `swctl.toml` in the current directory, falling back to compiled defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config: Config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("swctl.toml").exists() {
            let content =
                std::fs::read_to_string("swctl.toml").expect("Failed to read swctl.toml");
            toml::from_str(&content).expect("Failed to parse swctl.toml")
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(key) = std::env::var("SWCTL_API_KEY") {
            config.auth.api_key = key;
        }
        if let Ok(listen) = std::env::var("SWCTL_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(url) = std::env::var("SWCTL_CALLBACK_URL") {
            config.callback.base_url = url;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.listen, "0.0.0.0:9301");
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.sync.request_timeout_secs, 10);
        assert_eq!(config.schema.token_ttl_secs, 600);
        assert_eq!(config.auth.api_key, "change-me");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            api_key = "secret"

            [callback]
            base_url = "https://mgmt.example.com"

            [sync]
            interval_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.api_key, "secret");
        assert_eq!(config.callback.base_url, "https://mgmt.example.com");
        assert_eq!(config.sync.interval_secs, 5);
        // Untouched sections keep compiled defaults
        assert_eq!(config.sync.request_timeout_secs, 10);
        assert_eq!(config.server.listen, "0.0.0.0:9301");
    }
}
