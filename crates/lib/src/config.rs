//! Configuration types and credential resolution.
//!
//! Config is loaded from a JSON file (e.g. `~/.smsgate-kit/config.json`) and
//! environment. Precedence for the gateway connection: CLI flag, then
//! environment variable, then config file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable for the gateway base URL.
pub const ENV_BASE_URL: &str = "SMSGATE_URL";
/// Environment variable for the Basic auth username.
pub const ENV_USERNAME: &str = "SMSGATE_USER";
/// Environment variable for the Basic auth password.
pub const ENV_PASSWORD: &str = "SMSGATE_PASS";

const DEFAULT_TIMEOUT_SECONDS: u64 = 20;

/// Validated connection settings for the gateway client. Constructed once per
/// session and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Gateway base URL without a trailing slash, e.g. `http://192.168.0.37:8080`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Credentials {
    /// Validates that base URL, username, and password are all non-empty and
    /// strips any trailing slash from the base URL.
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            bail!("missing base URL (use --base-url or {})", ENV_BASE_URL);
        }
        let username = username.trim().to_string();
        if username.is_empty() {
            bail!("missing username (use --username or {})", ENV_USERNAME);
        }
        if password.is_empty() {
            bail!("missing password (use --password or {})", ENV_PASSWORD);
        }
        Ok(Self {
            base_url,
            username,
            password: password.to_string(),
            timeout,
        })
    }
}

/// Top-level kit config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway connection defaults (lowest precedence; flags and env win).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Webhook test listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Browser UI server settings.
    #[serde(default)]
    pub web: WebConfig,
}

/// Gateway connection defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://192.168.0.37:8080`. Overridden by SMSGATE_URL.
    pub base_url: Option<String>,

    /// Basic auth username. Overridden by SMSGATE_USER.
    pub username: Option<String>,

    /// Basic auth password. Overridden by SMSGATE_PASS.
    pub password: Option<String>,

    /// HTTP timeout in seconds (default 20).
    pub timeout_seconds: Option<u64>,
}

/// Webhook listener bind address, port, and optional signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Bind address (default "0.0.0.0" so the gateway device can reach us).
    #[serde(default = "default_listener_host")]
    pub host: String,

    /// Listener port (default 8787).
    #[serde(default = "default_listener_port")]
    pub port: u16,

    /// Shared secret for X-Signature verification. Verification is skipped
    /// when absent.
    pub signing_key: Option<String>,
}

fn default_listener_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listener_port() -> u16 {
    8787
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_listener_host(),
            port: default_listener_port(),
            signing_key: None,
        }
    }
}

/// Browser UI bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebConfig {
    /// Bind address (default "127.0.0.1"; the form carries credentials, keep it local).
    #[serde(default = "default_web_bind")]
    pub bind: String,

    /// Port (default 8765).
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    8765
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_web_bind(),
            port: default_web_port(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn flag_nonempty(flag: Option<&str>) -> Option<String> {
    flag.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the gateway base URL: flag, then SMSGATE_URL, then config.
pub fn resolve_base_url(flag: Option<&str>, config: &Config) -> Option<String> {
    flag_nonempty(flag)
        .or_else(|| env_nonempty(ENV_BASE_URL))
        .or_else(|| config.gateway.base_url.clone().filter(|s| !s.trim().is_empty()))
}

/// Resolve the Basic auth username: flag, then SMSGATE_USER, then config.
pub fn resolve_username(flag: Option<&str>, config: &Config) -> Option<String> {
    flag_nonempty(flag)
        .or_else(|| env_nonempty(ENV_USERNAME))
        .or_else(|| config.gateway.username.clone().filter(|s| !s.trim().is_empty()))
}

/// Resolve the Basic auth password: flag, then SMSGATE_PASS, then config.
pub fn resolve_password(flag: Option<&str>, config: &Config) -> Option<String> {
    flag_nonempty(flag)
        .or_else(|| env_nonempty(ENV_PASSWORD))
        .or_else(|| config.gateway.password.clone().filter(|s| !s.is_empty()))
}

/// Resolve full credentials from flags, environment, and config file. Fails
/// when any of base URL / username / password is missing everywhere.
pub fn resolve_credentials(
    base_url: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
    timeout_seconds: Option<u64>,
    config: &Config,
) -> Result<Credentials> {
    let base_url = resolve_base_url(base_url, config).unwrap_or_default();
    let username = resolve_username(username, config).unwrap_or_default();
    let password = resolve_password(password, config).unwrap_or_default();
    let timeout = timeout_seconds
        .or(config.gateway.timeout_seconds)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    Credentials::new(&base_url, &username, &password, Duration::from_secs(timeout))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SMSGATE_KIT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".smsgate-kit").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or SMSGATE_KIT_CONFIG_PATH). Missing
/// file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listener_and_web_settings() {
        let c = Config::default();
        assert_eq!(c.listener.host, "0.0.0.0");
        assert_eq!(c.listener.port, 8787);
        assert_eq!(c.web.bind, "127.0.0.1");
        assert_eq!(c.web.port, 8765);
    }

    #[test]
    fn credentials_strip_trailing_slash() {
        let c = Credentials::new(
            "http://10.0.0.5:8080/",
            "sms",
            "secret",
            Duration::from_secs(20),
        )
        .unwrap();
        assert_eq!(c.base_url, "http://10.0.0.5:8080");
    }

    #[test]
    fn credentials_reject_missing_fields() {
        assert!(Credentials::new("", "sms", "secret", Duration::from_secs(1)).is_err());
        assert!(Credentials::new("http://x", "  ", "secret", Duration::from_secs(1)).is_err());
        assert!(Credentials::new("http://x", "sms", "", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn flag_wins_over_config() {
        let mut config = Config::default();
        config.gateway.base_url = Some("http://from-config".to_string());
        let resolved = resolve_base_url(Some("http://from-flag"), &config);
        assert_eq!(resolved.as_deref(), Some("http://from-flag"));
    }

    #[test]
    fn config_parses_camel_case_fields() {
        let raw = r#"{
            "gateway": { "baseUrl": "http://10.0.0.5:8080", "username": "sms", "timeoutSeconds": 5 },
            "listener": { "port": 9000, "signingKey": "k" }
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.gateway.base_url.as_deref(), Some("http://10.0.0.5:8080"));
        assert_eq!(config.gateway.timeout_seconds, Some(5));
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.signing_key.as_deref(), Some("k"));
        assert_eq!(config.web.port, 8765);
    }
}
