//! Configuration for receipt-check.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default verification endpoint.
pub const DEFAULT_API_URL: &str = "https://proverkacheka.com/api/v1/check/get";

/// Verifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Verification service endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API token sent with every request.
    #[serde(default)]
    pub token: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Directory exported receipts are written to.
    #[serde(default = "default_receipts_dir")]
    pub receipts_dir: PathBuf,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of network attempts per verification.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in seconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached receipts.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: String::new(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            receipts_dir: default_receipts_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay() -> f64 {
    1.0
}

const fn default_cache_capacity() -> usize {
    100
}

fn default_receipts_dir() -> PathBuf {
    PathBuf::from("receipts")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Location of the config file when `--config` is not given.
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "receipt-check")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("receipt-check.toml"))
}

impl VerifierConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that the values make sense before building a verifier.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(Error::Config("api_url must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if !self.retry.base_delay_secs.is_finite() || self.retry.base_delay_secs < 0.0 {
            return Err(Error::Config(format!(
                "retry.base_delay_secs must be a non-negative number, got {}",
                self.retry.base_delay_secs
            )));
        }
        Ok(())
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
