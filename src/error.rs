//! Error types for bc-monitor

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Endpoint directory errors
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Metrics sink errors
    #[error("Metrics sink error: {0}")]
    Sink(#[from] SinkError),

    /// JSON-RPC protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Endpoint directory errors
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// No cached endpoints exist and the directory could not be reached
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Directory returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed directory response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Metrics sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Metrics sink unavailable: {0}")]
    Unavailable(String),

    #[error("Metrics write rejected with HTTP {status}: {body}")]
    WriteRejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to write records: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON-RPC protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid api_class: {0}")]
    InvalidApiClass(String),

    /// The response carried no `result`, usually an `error` object instead
    #[error("RPC error{}: {message}", code.map(|c| format!(" {}", c)).unwrap_or_default())]
    Rpc { code: Option<i64>, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config file: {0}")]
    InvalidFile(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
