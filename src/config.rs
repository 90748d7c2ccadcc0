//! Application configuration loaded from `config.yaml`.
//!
//! Every section is optional; missing values fall back to the defaults below.
//! `PORT` and `FEED_BASE_URL` environment variables override the file.

use crate::application::poll_scheduler::DEFAULT_POLL_INTERVAL;
use crate::domain::{ReferencePolicy, Timeframe};
use crate::infrastructure::FeedMode;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    /// Server configuration (host, port, CORS origins)
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream feed and polling configuration
    #[serde(default)]
    pub feed: FeedConfig,
    /// Budget for proxied upstream requests
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Server configuration settings.
#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on (default: 3010)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed CORS origins (default: "*")
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Feed configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct FeedConfig {
    /// `market_chart` (time series) or `snapshot` (current rate only)
    #[serde(default)]
    pub mode: FeedMode,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
    /// Upstream asset id (e.g. "bitcoin")
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Quote currency (e.g. "usd")
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    /// Day count or duration code used until a client picks another
    #[serde(default = "default_timeframe")]
    pub default_timeframe: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub reference_policy: ReferencePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: FeedMode::default(),
            base_url: default_base_url(),
            snapshot_url: default_snapshot_url(),
            asset: default_asset(),
            vs_currency: default_vs_currency(),
            default_timeframe: default_timeframe(),
            poll_interval_secs: default_poll_interval_secs(),
            reference_policy: ReferencePolicy::default(),
        }
    }
}

impl FeedConfig {
    pub fn timeframe(&self) -> anyhow::Result<Timeframe> {
        self.default_timeframe
            .parse::<Timeframe>()
            .context("Invalid feed.default_timeframe")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Rate limiting configuration
#[derive(Deserialize, Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum proxied upstream requests per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3010
}
fn default_allowed_origins() -> String {
    "*".to_string()
}
fn default_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}
fn default_snapshot_url() -> String {
    "https://api.coindesk.com/v1/bpi/currentprice.json".to_string()
}
fn default_asset() -> String {
    "bitcoin".to_string()
}
fn default_vs_currency() -> String {
    "usd".to_string()
}
fn default_timeframe() -> String {
    "30".to_string()
}
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_requests_per_minute() -> u32 {
    30
}

impl AppConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read {} - ensure file exists in working directory",
                path.display()
            )
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)
            .context("Failed to parse config - check YAML syntax and structure")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.feed.timeframe()?;
        if self.feed.poll_interval_secs == 0 {
            anyhow::bail!("feed.poll_interval_secs must be greater than zero");
        }
        if self.rate_limit.requests_per_minute == 0 {
            anyhow::bail!("rate_limit.requests_per_minute must be greater than zero");
        }
        Ok(())
    }

    /// Apply `PORT` and `FEED_BASE_URL` overrides from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("FEED_BASE_URL") {
            if !url.trim().is_empty() {
                self.feed.base_url = url;
            }
        }
    }
}
