use crate::error::ConfigError;
use crate::normalize::{DEFAULT_CPU_THRESHOLD, DEFAULT_MAX_MESSAGE_LENGTH, MAX_WINDOW_HOURS};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`Config::region`]
pub const ENV_REGION: &str = "CLOUDSCOPE_REGION";

/// Environment variable overriding [`BackendConfig::endpoint`]
pub const ENV_ENDPOINT: &str = "CLOUDSCOPE_ENDPOINT";

/// Application configuration
///
/// Every section is optional in the TOML file and falls back to its defaults.
///
/// ```toml
/// region = "eu-west-1"
///
/// [backend]
/// endpoint = "http://telemetry.internal:8080"
/// timeout_secs = 5
///
/// [alerts]
/// cpu_threshold = 85.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Region every provider is scoped to
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_supported_regions")]
    pub supported_regions: Vec<String>,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub offline: OfflineConfig,
}

/// Telemetry gateway connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts for a call failing transiently, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further retry
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertsConfig {
    /// CPU utilization percentage that raises an alert
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default = "default_window_hours")]
    pub default_window_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogsConfig {
    /// Characters kept from each log message before truncation
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OfflineConfig {
    /// Seed for synthetic metric jitter; random when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// Skip the backend probe and start every provider offline
    #[serde(default)]
    pub force: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_supported_regions() -> Vec<String> {
    [
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "eu-central-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-northeast-1",
        "ap-northeast-2",
        "sa-east-1",
        "ca-central-1",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4566".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_cpu_threshold() -> f64 {
    DEFAULT_CPU_THRESHOLD
}

fn default_window_hours() -> u32 {
    1
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            supported_regions: default_supported_regions(),
            backend: BackendConfig::default(),
            alerts: AlertsConfig::default(),
            metrics: MetricsConfig::default(),
            logs: LogsConfig::default(),
            offline: OfflineConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: default_cpu_threshold(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_window_hours: default_window_hours(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// `ConfigError::ReadError` if the file cannot be read, `ConfigError::TomlError`
    /// if it is not valid TOML, `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CLOUDSCOPE_REGION` and `CLOUDSCOPE_ENDPOINT` from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup, then re-validate
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup(ENV_REGION).filter(|v| !v.trim().is_empty()) {
            debug!("Region overridden by {}: {}", ENV_REGION, region);
            self.region = region.trim().to_string();
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            debug!("Endpoint overridden by {}: {}", ENV_ENDPOINT, endpoint);
            self.backend.endpoint = endpoint.trim().to_string();
        }
        self.validate()
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.supported_regions.iter().any(|r| r == &self.region) {
            return Err(ConfigError::ValidationError(format!(
                "region '{}' is not supported (expected one of: {})",
                self.region,
                self.supported_regions.join(", ")
            )));
        }
        if self.backend.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.endpoint must not be empty".to_string(),
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.backend.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "backend.max_attempts must be at least 1".to_string(),
            ));
        }
        let threshold = self.alerts.cpu_threshold;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ConfigError::ValidationError(format!(
                "alerts.cpu_threshold must be in (0, 100], got {}",
                threshold
            )));
        }
        let hours = self.metrics.default_window_hours;
        if hours == 0 || hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "metrics.default_window_hours must be in 1..={}, got {}",
                MAX_WINDOW_HOURS, hours
            )));
        }
        if self.logs.max_message_length == 0 {
            return Err(ConfigError::ValidationError(
                "logs.max_message_length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
