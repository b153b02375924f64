//! Configuration management for mresearch
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{MresearchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for mresearch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Research service connection settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Job status polling settings
    #[serde(default)]
    pub polling: PollingConfig,
    /// Local record store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// History listing settings
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Research service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the research service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout applied to every HTTP request (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("mresearch/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

/// Job status polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed period between status fetches (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PollingConfig {
    /// Polling period as a `Duration`
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

/// Local record store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite store; the user data directory is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// History listing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Page size used when no `--limit` is given
    #[serde(default = "default_history_limit")]
    pub default_limit: usize,
}

fn default_history_limit() -> usize {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_history_limit(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MresearchError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MresearchError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("MRESEARCH_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(timeout) = std::env::var("MRESEARCH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MRESEARCH_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(interval) = std::env::var("MRESEARCH_POLL_INTERVAL_MS") {
            if let Ok(value) = interval.parse() {
                self.polling.interval_ms = value;
            } else {
                tracing::warn!("Invalid MRESEARCH_POLL_INTERVAL_MS: {}", interval);
            }
        }

        if let Ok(store) = std::env::var("MRESEARCH_STORE") {
            self.storage.path = Some(PathBuf::from(store));
        }

        if let Ok(limit) = std::env::var("MRESEARCH_HISTORY_LIMIT") {
            if let Ok(value) = limit.parse() {
                self.history.default_limit = value;
            } else {
                tracing::warn!("Invalid MRESEARCH_HISTORY_LIMIT: {}", limit);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.api_url {
            self.api.base_url = url.clone();
        }

        if let Some(store) = &cli.store {
            self.storage.path = Some(store.clone());
        }

        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Use the API URL saved with `settings set api_url`
    ///
    /// The saved value replaces the file setting but never an explicit
    /// `MRESEARCH_API_URL` or `--api-url`.
    pub fn apply_saved_api_url(&mut self, saved: Option<&str>, cli: &crate::cli::Cli) {
        if cli.api_url.is_some() || std::env::var("MRESEARCH_API_URL").is_ok() {
            return;
        }
        if let Some(url) = saved.map(str::trim).filter(|url| !url.is_empty()) {
            tracing::debug!("Using saved API URL: {}", url);
            self.api.base_url = url.to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API URL is not an http(s) URL or any numeric
    /// setting is out of range
    pub fn validate(&self) -> Result<()> {
        let url = crate::api::normalize_base_url(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MresearchError::Config(format!(
                "api.base_url must use http or https, got: {}",
                url.scheme()
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(MresearchError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.polling.interval_ms == 0 {
            return Err(MresearchError::Config(
                "polling.interval_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.history.default_limit == 0 || self.history.default_limit > 100 {
            return Err(MresearchError::Config(
                "history.default_limit must be between 1 and 100".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
