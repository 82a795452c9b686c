//! Configuration file handling

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Polling settings
    #[serde(default)]
    pub settings: Settings,

    /// Endpoint directory service
    #[serde(default)]
    pub directory: DirectoryFileConfig,

    /// InfluxDB metrics store
    #[serde(default)]
    pub influxdb: InfluxFileConfig,
}

/// Polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds to sleep between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Max probes in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// How often the dispatcher wakes up while waiting on probes
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_ms: u64,

    /// Retry over WebSocket when an HTTP endpoint asks for an upgrade
    #[serde(default = "default_websocket_fallback")]
    pub websocket_fallback: bool,

    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_concurrency() -> usize {
    8
}

fn default_request_timeout() -> u64 {
    2500
}

fn default_housekeeping_interval() -> u64 {
    200
}

fn default_websocket_fallback() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            concurrency: default_concurrency(),
            request_timeout_ms: default_request_timeout(),
            housekeeping_interval_ms: default_housekeeping_interval(),
            websocket_fallback: default_websocket_fallback(),
            log_level: default_log_level(),
        }
    }
}

/// Endpoint directory section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryFileConfig {
    /// Base URL of the directory API
    #[serde(default)]
    pub url: Option<String>,

    /// Local endpoint cache file
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Seconds before the cache is refreshed
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,

    /// Timeout for directory requests in seconds
    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache.json")
}

fn default_cache_max_age() -> u64 {
    3600
}

fn default_directory_timeout() -> u64 {
    3
}

impl Default for DirectoryFileConfig {
    fn default() -> Self {
        Self {
            url: None,
            cache_path: default_cache_path(),
            cache_max_age_secs: default_cache_max_age(),
            timeout_secs: default_directory_timeout(),
        }
    }
}

/// InfluxDB section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfluxFileConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub org: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    /// API token; `INFLUXDB_TOKEN` takes precedence
    #[serde(default)]
    pub token: Option<String>,
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bc-monitor")
            .join("config.toml")
    }

    /// Load from default path
    pub fn load_default() -> Result<Option<Self>> {
        let path = Self::default_path();
        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Load from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        Ok(config)
    }
}
