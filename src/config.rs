// src/config.rs

//! Manages relay configuration: loading, layering environment overrides, and validation.
//!
//! Values come from an optional TOML file, overridden by environment variables with
//! the same (case-insensitive) names, e.g. `WS_URL`, `BOT_TOKEN` or `PING_INTERVAL`.

use anyhow::{Context, Result, anyhow};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::core::notify::LinkButtons;
use crate::core::protocol::DEFAULT_NAMESPACE;
use crate::core::relay::UpstreamHeaders;

/// A raw representation of the configuration before validation.
/// Required values are optional here so that a missing one can be reported by name.
#[derive(Deserialize, Debug)]
struct RawConfig {
    ws_url: Option<String>,
    auth_message: Option<String>,
    bot_token: Option<String>,
    group_id: Option<String>,
    channel_url: Option<String>,
    dev_url: Option<String>,
    support: Option<String>,

    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_ping_interval")]
    ping_interval: u64,
    #[serde(default = "default_namespace")]
    namespace: String,

    #[serde(default = "default_ws_origin")]
    ws_origin: String,
    #[serde(default = "default_ws_referer")]
    ws_referer: String,
    /// Defaults to the host name of `ws_url`, without the port.
    #[serde(default)]
    ws_host: Option<String>,
    #[serde(default = "default_ws_user_agent")]
    ws_user_agent: String,

    #[serde(with = "humantime_serde", default = "default_reconnect_delay")]
    reconnect_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_handshake_delay")]
    handshake_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    connect_timeout: Duration,

    #[serde(default = "default_telegram_api_base")]
    telegram_api_base: String,
    #[serde(default = "default_delivery_retries")]
    delivery_retries: u32,
    #[serde(with = "humantime_serde", default = "default_delivery_retry_delay")]
    delivery_retry_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_delivery_timeout")]
    delivery_timeout: Duration,

    #[serde(default)]
    alert_footer: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_ping_interval() -> u64 {
    25
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_ws_origin() -> String {
    "https://ivasms.com".to_string()
}
fn default_ws_referer() -> String {
    "https://ivasms.com/".to_string()
}
fn default_ws_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_reconnect_delay() -> Duration {
    Duration::from_secs(1)
}
fn default_handshake_delay() -> Duration {
    Duration::from_millis(500)
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_delivery_retries() -> u32 {
    3
}
fn default_delivery_retry_delay() -> Duration {
    Duration::from_secs(5)
}
fn default_delivery_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Upstream feed settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub auth_message: String,
    pub namespace: String,
    pub headers: UpstreamHeaders,
    pub ping_interval: Duration,
    pub reconnect_delay: Duration,
    pub handshake_delay: Duration,
    pub connect_timeout: Duration,
}

/// Telegram delivery settings.
#[derive(Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    pub group_id: String,
    pub buttons: LinkButtons,
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub footer: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .field("group_id", &self.group_id)
            .field("buttons", &self.buttons)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .field("footer", &self.footer)
            .finish()
    }
}

/// Represents the final, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub upstream: UpstreamConfig,
    pub telegram: TelegramConfig,
}

impl Config {
    /// Loads the configuration from an optional TOML file at `path`, layered under
    /// environment variables.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("Failed to load configuration (file '{path}')"))?;
        Self::resolve(raw)
    }

    /// Parses a configuration from TOML text only, ignoring the environment.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Failed to parse TOML configuration")?;
        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> Result<Self> {
        let url = required(raw.ws_url, "ws_url")?;
        let ws_host = match raw.ws_host {
            Some(host) => host,
            None => host_header_for(&url)?,
        };

        let config = Config {
            host: raw.host,
            port: raw.port,
            log_level: raw.log_level,
            upstream: UpstreamConfig {
                url,
                auth_message: required(raw.auth_message, "auth_message")?,
                namespace: raw.namespace,
                headers: UpstreamHeaders {
                    user_agent: raw.ws_user_agent,
                    origin: raw.ws_origin,
                    referer: raw.ws_referer,
                    host: ws_host,
                },
                ping_interval: Duration::from_secs(raw.ping_interval),
                reconnect_delay: raw.reconnect_delay,
                handshake_delay: raw.handshake_delay,
                connect_timeout: raw.connect_timeout,
            },
            telegram: TelegramConfig {
                api_base: raw.telegram_api_base,
                bot_token: required(raw.bot_token, "bot_token")?,
                group_id: required(raw.group_id, "group_id")?,
                buttons: LinkButtons {
                    channel_url: required(raw.channel_url, "channel_url")?,
                    dev_url: required(raw.dev_url, "dev_url")?,
                    support_url: required(raw.support, "support")?,
                },
                retries: raw.delivery_retries,
                retry_delay: raw.delivery_retry_delay,
                timeout: raw.delivery_timeout,
                footer: raw.alert_footer.filter(|f| !f.trim().is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }

        let ws_url = Url::parse(&self.upstream.url)
            .with_context(|| format!("ws_url '{}' is not a valid URL", self.upstream.url))?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(anyhow!(
                "ws_url must use the ws:// or wss:// scheme, got '{}'",
                ws_url.scheme()
            ));
        }
        if !self.upstream.namespace.starts_with('/') {
            return Err(anyhow!(
                "namespace must start with '/', got '{}'",
                self.upstream.namespace
            ));
        }
        if self.upstream.ping_interval.is_zero() {
            return Err(anyhow!("ping_interval cannot be 0"));
        }
        if self.upstream.connect_timeout.is_zero() {
            return Err(anyhow!("connect_timeout cannot be 0"));
        }

        let api_base = Url::parse(&self.telegram.api_base).with_context(|| {
            format!(
                "telegram_api_base '{}' is not a valid URL",
                self.telegram.api_base
            )
        })?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(anyhow!("telegram_api_base must be an http(s) URL"));
        }
        for (key, link) in [
            ("channel_url", &self.telegram.buttons.channel_url),
            ("dev_url", &self.telegram.buttons.dev_url),
            ("support", &self.telegram.buttons.support_url),
        ] {
            Url::parse(link).with_context(|| format!("{key} '{link}' is not a valid URL"))?;
        }
        if self.telegram.retries == 0 {
            return Err(anyhow!("delivery_retries cannot be 0"));
        }
        Ok(())
    }
}

/// Returns the value of a required key, rejecting absent and blank values.
fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(anyhow!(
            "missing required configuration value '{}' (set it in the config file or the {} environment variable)",
            key,
            key.to_uppercase()
        )),
    }
}

/// Derives the `Host` header value for a WebSocket URL: the bare host name, without
/// any port.
fn host_header_for(ws_url: &str) -> Result<String> {
    let url = Url::parse(ws_url).with_context(|| format!("ws_url '{ws_url}' is not a valid URL"))?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("ws_url '{}' has no host", ws_url))
}
