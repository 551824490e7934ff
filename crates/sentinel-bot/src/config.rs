//! Application configuration.
//!
//! Loaded from a TOML file, then overlaid with `SENTINEL__<SECTION>__<KEY>`
//! environment variables (e.g. `SENTINEL__API__PORT=9090`). Secrets are never
//! read from the file: the relay API key comes from `SENTINEL_RELAY_API_KEY`,
//! SMTP credentials from `SENTINEL_SMTP_USERNAME` and `SENTINEL_SMTP_PASSWORD`.

use crate::error::{AppError, AppResult};
use sentinel_api::ApiConfig;
use sentinel_notify::{RelayConfig, SmtpConfig};
use sentinel_trigger::TriggerSemantics;
use sentinel_ws::{ConnectionConfig, DEFAULT_FEED_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SENTINEL_CONFIG";

/// Config file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const ENV_PREFIX: &str = "SENTINEL";
const ENV_SEPARATOR: &str = "__";

/// Market data feed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default)]
    pub reconnect_jitter_ms: u64,
    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,
    #[serde(default = "default_tick_channel_capacity")]
    pub tick_channel_capacity: usize,
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    5_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_command_channel_capacity() -> usize {
    64
}

fn default_tick_channel_capacity() -> usize {
    1_000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_jitter_ms: 0,
            command_channel_capacity: default_command_channel_capacity(),
            tick_channel_capacity: default_tick_channel_capacity(),
        }
    }
}

impl From<FeedConfig> for ConnectionConfig {
    fn from(cfg: FeedConfig) -> Self {
        Self {
            url: cfg.url,
            reconnect_base_delay_ms: cfg.reconnect_base_delay_ms,
            reconnect_max_delay_ms: cfg.reconnect_max_delay_ms,
            reconnect_jitter_ms: cfg.reconnect_jitter_ms,
            command_channel_capacity: cfg.command_channel_capacity,
        }
    }
}

/// Subscription reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
}

fn default_sync_interval_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval_secs(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Alert store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Durable JSON Lines journal.
    #[default]
    Journal,
    /// Process-local; alerts are lost on restart.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/alerts.jsonl")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub semantics: TriggerSemantics,
}

/// Notification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    /// Log the composed e-mail only.
    #[default]
    Log,
    /// POST to an HTTP mail relay.
    Relay,
    /// Submit to an SMTP relay.
    Smtp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub backend: NotifyBackend,
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    /// From address of alert e-mails.
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_smtp_starttls")]
    pub smtp_starttls: bool,
    /// Delivery timeout for the relay and SMTP backends.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_relay_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

fn default_sender() -> String {
    "alerts@price-sentinel.local".to_string()
}

fn default_smtp_host() -> String {
    "smtp-relay.brevo.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_starttls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: NotifyBackend::default(),
            relay_url: default_relay_url(),
            sender: default_sender(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_starttls: default_smtp_starttls(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NotifyConfig {
    /// Relay settings, with the API key taken from the environment.
    pub fn relay_config(&self) -> RelayConfig {
        let mut relay = RelayConfig::new(&self.relay_url, &self.sender).with_env_api_key();
        relay.timeout = Duration::from_secs(self.timeout_secs);
        relay
    }

    /// SMTP settings, with credentials taken from the environment.
    pub fn smtp_config(&self) -> SmtpConfig {
        let mut smtp =
            SmtpConfig::new(&self.smtp_host, self.smtp_port, &self.sender).with_env_credentials();
        smtp.starttls = self.smtp_starttls;
        smtp.timeout = Duration::from_secs(self.timeout_secs);
        smtp
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl AppConfig {
    /// Resolve the config path: CLI argument, then `SENTINEL_CONFIG`, then
    /// the default path. The file must exist only when explicitly named.
    pub fn load(cli_path: Option<String>) -> AppResult<Self> {
        match cli_path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok()) {
            Some(path) => Self::from_path(path, true),
            None => {
                if !Path::new(DEFAULT_CONFIG_PATH).exists() {
                    tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                }
                Self::from_path(DEFAULT_CONFIG_PATH, false)
            }
        }
    }

    /// Load `path` with environment overrides applied on top.
    pub fn from_path(path: impl AsRef<Path>, required: bool) -> AppResult<Self> {
        let path = path.as_ref();
        let loaded: Self = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let loaded: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.feed.url.trim().is_empty() {
            return Err(AppError::Config("feed.url must not be empty".to_string()));
        }
        if self.feed.reconnect_base_delay_ms == 0 {
            return Err(AppError::Config(
                "feed.reconnect_base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.feed.reconnect_max_delay_ms < self.feed.reconnect_base_delay_ms {
            return Err(AppError::Config(
                "feed.reconnect_max_delay_ms must be >= reconnect_base_delay_ms".to_string(),
            ));
        }
        if self.feed.command_channel_capacity == 0 || self.feed.tick_channel_capacity == 0 {
            return Err(AppError::Config(
                "feed channel capacities must be greater than 0".to_string(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(AppError::Config(
                "sync.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.notify.backend == NotifyBackend::Relay && self.notify.relay_url.trim().is_empty() {
            return Err(AppError::Config(
                "notify.relay_url is required for the relay backend".to_string(),
            ));
        }
        if self.notify.backend == NotifyBackend::Smtp && self.notify.smtp_host.trim().is_empty() {
            return Err(AppError::Config(
                "notify.smtp_host is required for the smtp backend".to_string(),
            ));
        }
        if self.notify.sender.trim().is_empty() {
            return Err(AppError::Config("notify.sender must not be empty".to_string()));
        }
        Ok(())
    }
}
