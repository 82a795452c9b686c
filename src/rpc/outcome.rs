//! Probe outcomes
//!
//! Per-endpoint failures are data here, never errors that escape the
//! dispatcher.

use crate::config::Endpoint;
use crate::error::ProtocolError;
use std::fmt;
use std::time::Duration;

/// Per-endpoint failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    ConnectionError,
    RpcError,
    MalformedResponse,
    InvalidApiClass,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::RpcError => "RpcError",
            ErrorKind::MalformedResponse => "MalformedResponse",
            ErrorKind::InvalidApiClass => "InvalidApiClass",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a probe produced no height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Numeric code the endpoint reported, from a JSON-RPC error object or
    /// scraped from a plaintext body
    pub code: Option<i64>,
}

impl ProbeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: Option<i64>) -> Self {
        self.code = code;
        self
    }
}

impl From<ProtocolError> for ProbeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidApiClass(class) => {
                ProbeError::new(ErrorKind::InvalidApiClass, format!("unsupported api_class {:?}", class))
            }
            ProtocolError::Rpc { code, message } => {
                ProbeError::new(ErrorKind::RpcError, message).with_code(code)
            }
            ProtocolError::Malformed(message) => ProbeError::new(ErrorKind::MalformedResponse, message),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Transport that produced the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// HTTP(S) POST
    Http,
    /// WebSocket, selected by a ws/wss URL
    WebSocket,
    /// WebSocket retry after the HTTP attempt asked for an upgrade
    WebSocketFallback,
}

impl Transport {
    pub fn is_websocket(self) -> bool {
        !matches!(self, Transport::Http)
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Transport::WebSocketFallback)
    }
}

/// Result of probing one endpoint in one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub endpoint: Endpoint,
    /// Status of the HTTP response, if one arrived
    pub http_status: Option<u16>,
    /// Round-trip time of the attempt that produced a response
    pub latency: Option<Duration>,
    pub block_height: Option<u64>,
    pub transport: Transport,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    /// A probe that returned a height
    pub fn success(
        endpoint: Endpoint,
        transport: Transport,
        http_status: u16,
        latency: Duration,
        block_height: u64,
    ) -> Self {
        Self {
            endpoint,
            http_status: Some(http_status),
            latency: Some(latency),
            block_height: Some(block_height),
            transport,
            error: None,
        }
    }

    /// A probe that failed before any response arrived
    pub fn failure(endpoint: Endpoint, transport: Transport, error: ProbeError) -> Self {
        Self {
            endpoint,
            http_status: None,
            latency: None,
            block_height: None,
            transport,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.block_height.is_some()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn latency_secs(&self) -> Option<f64> {
        self.latency.map(|l| l.as_secs_f64())
    }
}
