mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Upstream provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Provider base URL (e.g., "https://api.openai.com/v1")
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-attempt request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
}

fn default_upstream_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_upstream_timeout() -> u64 {
    15
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            api_key: None,
            timeout_seconds: default_upstream_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Outbound retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per dispatch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit; attempt N waits N * base_delay_ms before retrying
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Model fallback configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    /// Fallback order, most-preferred first; the last entry is terminal
    #[serde(default = "default_chain")]
    pub chain: Vec<String>,
    /// Model used when the requested id is unknown
    #[serde(default = "default_model")]
    pub default_model: String,
    /// How long a model stays marked rate-limited
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,
    /// How often the sweep clears expired limits
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,
}

fn default_chain() -> Vec<String> {
    [
        "gpt-4o-mini",
        "gpt-4o",
        "gpt-4-turbo",
        "gpt-4",
        "gpt-3.5-turbo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_cooldown_hours() -> u64 {
    24
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            default_model: default_model(),
            cooldown_hours: default_cooldown_hours(),
            sweep_interval_minutes: default_sweep_interval(),
        }
    }
}

/// Usage telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,
    /// Ascending per-route alert levels within one hour window
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u64>,
    /// Which counter drives threshold alerts
    #[serde(default)]
    pub alert_on: AlertMetric,
    /// Number of routes listed in the hourly rollup
    #[serde(default = "default_top_routes")]
    pub top_routes: usize,
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_thresholds() -> Vec<u64> {
    vec![1, 10, 50, 100]
}

fn default_top_routes() -> usize {
    5
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            thresholds: default_thresholds(),
            alert_on: AlertMetric::default(),
            top_routes: default_top_routes(),
        }
    }
}

/// Counter that drives per-threshold alerts
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertMetric {
    #[default]
    Requests,
    Errors,
}

/// Operator notification configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Telegram sink configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Check cross-field constraints the type system cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.chain.is_empty() {
            return Err(ConfigError::Validation(
                "models.chain must list at least one model".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for id in &self.models.chain {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "models.chain lists '{}' more than once",
                    id
                )));
            }
        }

        if !self.models.chain.contains(&self.models.default_model) {
            return Err(ConfigError::Validation(format!(
                "models.default_model '{}' is not in models.chain",
                self.models.default_model
            )));
        }

        if !self
            .telemetry
            .thresholds
            .windows(2)
            .all(|pair| pair[0] < pair[1])
        {
            return Err(ConfigError::Validation(
                "telemetry.thresholds must be strictly ascending".to_string(),
            ));
        }

        if self.retry.max_attempts < 1 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        url::Url::parse(&self.upstream.url).map_err(|e| {
            ConfigError::Validation(format!("upstream.url '{}': {}", self.upstream.url, e))
        })?;

        if self.notifier.telegram.enabled
            && (self.notifier.telegram.bot_token.is_empty()
                || self.notifier.telegram.chat_id.is_empty())
        {
            return Err(ConfigError::Validation(
                "notifier.telegram requires bot_token and chat_id when enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
