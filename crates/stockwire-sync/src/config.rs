//! # Client Configuration
//!
//! Configuration for the inventory feed client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKWIRE_URL=wss://shop.example.com/ws/inventory/                 │
//! │     STOCKWIRE_MAX_ATTEMPTS=10                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockwire/client.toml (Linux)                            │
//! │     ~/Library/Application Support/com.stockwire.stockwire/client.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     1s base delay, 30s cap, 5 attempts, 10s connect timeout            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # client.toml
//! [server]
//! url = "wss://shop.example.com/ws/inventory/"
//! connect_timeout_secs = 10
//! ping_interval_secs = 30
//!
//! [reconnect]
//! base_delay_ms = 1000
//! max_delay_ms = 30000
//! max_attempts = 5   # 0 = retry forever
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::machine::ReconnectPolicy;

// =============================================================================
// Server Settings
// =============================================================================

/// Where and how to reach the inventory feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// WebSocket URL of the inventory feed (`ws://` or `wss://`).
    #[serde(default)]
    pub url: Option<String>,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Keepalive ping interval while connected (seconds).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            url: None,
            connect_timeout_secs: default_connect_timeout(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Feed endpoint settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Creates a config pointing at `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        ClientConfig {
            server: ServerSettings {
                url: Some(url.into()),
                ..Default::default()
            },
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    ///
    /// The default has no URL, so the result still fails validation when
    /// handed to a client.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections and fields take defaults.
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let raw = self
            .server
            .url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("server.url is required".into()))?;

        let url = Url::parse(raw)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(SyncError::InvalidUrl(format!(
                "Feed URL must start with ws:// or wss://, got: {}",
                raw
            )));
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "base_delay_ms must be greater than 0".into(),
            ));
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(SyncError::InvalidConfig(format!(
                "max_delay_ms ({}) must be at least base_delay_ms ({})",
                self.reconnect.max_delay_ms, self.reconnect.base_delay_ms
            )));
        }

        if self.server.connect_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.ping_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "ping_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    /// Unparseable numbers are logged and skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STOCKWIRE_URL") {
            debug!(url = %url, "Overriding feed URL from environment");
            self.server.url = Some(url);
        }

        if let Some(ms) = parse_override(&lookup, "STOCKWIRE_BASE_DELAY_MS") {
            self.reconnect.base_delay_ms = ms;
        }

        if let Some(ms) = parse_override(&lookup, "STOCKWIRE_MAX_DELAY_MS") {
            self.reconnect.max_delay_ms = ms;
        }

        if let Some(attempts) = parse_override(&lookup, "STOCKWIRE_MAX_ATTEMPTS") {
            self.reconnect.max_attempts = attempts;
        }

        if let Some(secs) = parse_override(&lookup, "STOCKWIRE_CONNECT_TIMEOUT_SECS") {
            self.server.connect_timeout_secs = secs;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockwire", "stockwire")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the feed URL if configured.
    pub fn url(&self) -> Option<&str> {
        self.server.url.as_deref()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.server.ping_interval_secs)
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => {
            debug!(key, value = %raw, "Overriding setting from environment");
            Some(value)
        }
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
