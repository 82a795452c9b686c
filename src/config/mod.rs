//! Runtime configuration
//!
//! [`ConfigFile`] is what lives on disk; [`Config`] is the validated form the
//! monitor runs with.

mod endpoint;
mod file;

pub use endpoint::Endpoint;
pub use file::{ConfigFile, DirectoryFileConfig, InfluxFileConfig, Settings};

use crate::error::{ConfigError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Validated monitor configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub directory: DirectoryConfig,
    /// Absent when no `[influxdb]` url is configured
    pub influx: Option<InfluxConfig>,
    pub dispatch: DispatchConfig,
    pub poll_interval: Duration,
    pub log_level: String,
}

/// Endpoint directory settings
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL, without trailing slash
    pub url: String,
    pub cache_path: PathBuf,
    pub cache_max_age: Duration,
    pub timeout: Duration,
}

/// InfluxDB v2 connection settings
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
}

/// Probe dispatch settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Max probes in flight
    pub concurrency: usize,
    /// Timeout for each transport attempt
    pub request_timeout: Duration,
    /// Dispatcher wake-up interval while probes are pending
    pub housekeeping_interval: Duration,
    pub websocket_fallback: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_timeout: Duration::from_millis(2500),
            housekeeping_interval: Duration::from_millis(200),
            websocket_fallback: true,
        }
    }
}

impl DispatchConfig {
    /// Validate the dispatch part of `[settings]`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.concurrency == 0 {
            return Err(invalid("settings.concurrency", "must be at least 1").into());
        }
        if settings.request_timeout_ms == 0 {
            return Err(invalid("settings.request_timeout_ms", "must be positive").into());
        }
        if settings.housekeeping_interval_ms == 0 {
            return Err(invalid("settings.housekeeping_interval_ms", "must be positive").into());
        }

        Ok(Self {
            concurrency: settings.concurrency,
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            housekeeping_interval: Duration::from_millis(settings.housekeeping_interval_ms),
            websocket_fallback: settings.websocket_fallback,
        })
    }
}

/// Log levels accepted in `settings.log_level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalize a configured log level, `None` if it is not a known level
pub fn normalize_log_level(level: &str) -> Option<&'static str> {
    let level = level.trim().to_lowercase();
    let level = match level.as_str() {
        "warning" => "warn",
        "critical" => "error",
        other => other,
    };
    LOG_LEVELS.iter().copied().find(|l| *l == level)
}

impl Config {
    /// Validate a config file
    pub fn from_file(file: &ConfigFile) -> Result<Self> {
        let settings = &file.settings;
        let dispatch = DispatchConfig::from_settings(settings)?;

        if file.directory.timeout_secs == 0 {
            return Err(invalid("directory.timeout_secs", "must be positive").into());
        }

        let directory_url = file
            .directory
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("directory.url".to_string()))?;

        let directory = DirectoryConfig {
            url: validate_url("directory.url", directory_url)?,
            cache_path: file.directory.cache_path.clone(),
            cache_max_age: Duration::from_secs(file.directory.cache_max_age_secs),
            timeout: Duration::from_secs(file.directory.timeout_secs),
        };

        let influx = match file.influxdb.url.as_deref() {
            Some(url) => Some(InfluxConfig {
                url: validate_url("influxdb.url", url)?,
                org: required(&file.influxdb.org, "influxdb.org")?,
                bucket: required(&file.influxdb.bucket, "influxdb.bucket")?,
                token: required(&file.influxdb.token, "influxdb.token")?,
            }),
            None => None,
        };

        Ok(Self {
            directory,
            influx,
            dispatch,
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            log_level: settings.log_level.clone(),
        })
    }

    /// InfluxDB settings, required for writing metrics
    pub fn influx(&self) -> Result<&InfluxConfig> {
        self.influx
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("influxdb.url".to_string()).into())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn required(value: &Option<String>, field: &str) -> std::result::Result<String, ConfigError> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

fn validate_url(field: &str, raw: &str) -> std::result::Result<String, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| invalid(field, &e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(field, "scheme must be http or https"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
