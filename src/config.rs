//! Configuration management for sevmeter
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{Result, SevError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// SEV customer API connection and credentials
    pub api: ApiConfig,

    /// Refresh cadence
    pub polling: PollingConfig,

    /// IANA timezone used to compute the "today" window (empty = system local)
    pub timezone: String,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// SEV API connection parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the customer REST API, endpoint names are appended to it
    pub base_url: String,

    /// Account identifier sent as `user_name` on login
    pub user_name: String,

    /// API key sent as `password` on login
    pub api_key: String,

    /// Hard deadline for each request/response round-trip
    pub request_timeout_secs: u64,

    /// Force a fresh login once the cached token is older than this (0 = never)
    pub token_max_age_secs: u64,
}

/// Refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PollingConfig {
    /// Minimum spacing between two network refreshes of one installation
    pub min_refresh_interval_secs: u64,

    /// How often the service asks every data point to update
    pub scan_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional override for console output level
    pub console_level: Option<String>,

    /// Optional override for file output level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WebConfig {
    /// Serve the data point API
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_max_age(&self) -> Option<Duration> {
        (self.token_max_age_secs > 0).then(|| Duration::from_secs(self.token_max_age_secs))
    }
}

impl PollingConfig {
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let default_paths = [
            "sevmeter.yaml",
            "/data/sevmeter.yaml",
            "/etc/sevmeter/config.yaml",
        ];

        let mut config = Config::default();
        for path in &default_paths {
            if Path::new(path).exists() {
                config = Self::from_file(path)?;
                break;
            }
        }
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override credentials and base URL from `SEV_USER_NAME`, `SEV_API_KEY`
    /// and `SEV_BASE_URL` when set and non-empty
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("SEV_USER_NAME") {
            self.api.user_name = v;
        }
        if let Some(v) = get("SEV_API_KEY") {
            self.api.api_key = v;
        }
        if let Some(v) = get("SEV_BASE_URL") {
            self.api.base_url = v;
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Resolve the configured timezone; `None` means system local time
    pub fn timezone(&self) -> Result<Option<chrono_tz::Tz>> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return Ok(None);
        }
        name.parse::<chrono_tz::Tz>()
            .map(Some)
            .map_err(|_| SevError::validation("timezone".to_string(), format!("Unknown timezone: {}", name)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(SevError::validation(
                "api.base_url",
                "Base URL cannot be empty",
            ));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(SevError::validation(
                "api.base_url",
                "Base URL must start with http:// or https://",
            ));
        }

        if self.api.user_name.trim().is_empty() {
            return Err(SevError::validation(
                "api.user_name",
                "User name cannot be empty",
            ));
        }

        if self.api.api_key.trim().is_empty() {
            return Err(SevError::validation(
                "api.api_key",
                "API key cannot be empty",
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(SevError::validation(
                "api.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.polling.scan_interval_secs == 0 {
            return Err(SevError::validation(
                "polling.scan_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.web.enabled && self.web.port == 0 {
            return Err(SevError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        self.timezone()?;
        Ok(())
    }
}
