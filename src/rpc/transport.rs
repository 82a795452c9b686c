//! HTTP and WebSocket probe transports
//!
//! HTTP(S) POST is the primary transport. `ws`/`wss` URLs go straight to a
//! WebSocket request/response, and an HTTP endpoint that answers with a
//! WebSocket upgrade signature gets exactly one WebSocket retry.

use crate::config::{DispatchConfig, Endpoint};
use crate::error::{Error, Result};
use crate::rpc::outcome::{ErrorKind, ProbeError, ProbeOutcome, Transport};
use crate::rpc::pool::Prober;
use crate::rpc::protocol::{ApiClass, RpcRequest};
use futures::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, UPGRADE};
use reqwest::StatusCode;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Some providers reject requests without a browser-like agent
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/118.0";

/// Plaintext marker used by CDN error pages, e.g. "error code: 1015"
const ERROR_CODE_MARKER: &str = "error code:";

/// Longest body excerpt carried in an error message
const MAX_EXCERPT: usize = 200;

/// HTTP reply that means "talk to me over WebSocket instead"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTrigger {
    /// 426 Upgrade Required
    UpgradeRequired,
    /// Response advertised `Upgrade: websocket`
    UpgradeOffered,
}

impl FallbackTrigger {
    /// Classify an HTTP reply; timeouts and transport errors never qualify
    pub fn classify(status: StatusCode, headers: &HeaderMap) -> Option<Self> {
        if status == StatusCode::UPGRADE_REQUIRED {
            return Some(FallbackTrigger::UpgradeRequired);
        }

        let offers_websocket = headers
            .get_all(UPGRADE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("websocket"));

        if offers_websocket && !status.is_success() {
            Some(FallbackTrigger::UpgradeOffered)
        } else {
            None
        }
    }
}

impl fmt::Display for FallbackTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackTrigger::UpgradeRequired => f.write_str("426 Upgrade Required"),
            FallbackTrigger::UpgradeOffered => f.write_str("WebSocket upgrade offered"),
        }
    }
}

/// Raw HTTP reply before height extraction
struct HttpReply {
    status: StatusCode,
    trigger: Option<FallbackTrigger>,
    body: std::result::Result<Vec<u8>, reqwest::Error>,
}

/// Probes endpoints over HTTP with WebSocket support
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
    websocket_fallback: bool,
}

impl HttpProber {
    /// Create a prober from dispatch settings
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.concurrency)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout: config.request_timeout,
            websocket_fallback: config.websocket_fallback,
        })
    }

    /// Probe one endpoint; always returns an outcome
    pub async fn probe_endpoint(&self, endpoint: Endpoint) -> ProbeOutcome {
        let default_transport = if endpoint.is_websocket() {
            Transport::WebSocket
        } else {
            Transport::Http
        };

        // Unknown API classes are rejected before any I/O
        let api_class = match endpoint.protocol() {
            Ok(class) => class,
            Err(e) => return ProbeOutcome::failure(endpoint, default_transport, e.into()),
        };

        let url = match Url::parse(endpoint.url.trim()) {
            Ok(url) => url,
            Err(e) => {
                let error = ProbeError::new(ErrorKind::ConnectionError, format!("invalid URL: {}", e));
                return ProbeOutcome::failure(endpoint, default_transport, error);
            }
        };

        let request = api_class.build_request();

        match url.scheme() {
            "http" | "https" => self.probe_http(endpoint, &url, api_class, &request).await,
            "ws" | "wss" => {
                self.probe_websocket(endpoint, &url, api_class, &request, Transport::WebSocket)
                    .await
            }
            other => {
                let error = ProbeError::new(
                    ErrorKind::ConnectionError,
                    format!("unsupported URL scheme {:?}", other),
                );
                ProbeOutcome::failure(endpoint, default_transport, error)
            }
        }
    }

    async fn probe_http(
        &self,
        endpoint: Endpoint,
        url: &Url,
        api_class: ApiClass,
        request: &RpcRequest,
    ) -> ProbeOutcome {
        let started = Instant::now();
        let reply = match tokio::time::timeout(self.timeout, self.post(url, request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                return ProbeOutcome::failure(endpoint, Transport::Http, classify_reqwest(&e));
            }
            Err(_) => {
                let error = timeout_error(self.timeout);
                return ProbeOutcome::failure(endpoint, Transport::Http, error);
            }
        };
        let latency = started.elapsed();
        let status = reply.status.as_u16();

        if let Some(trigger) = reply.trigger {
            let primary = ProbeError::new(
                ErrorKind::ConnectionError,
                format!("HTTP {}: {}", status, trigger),
            );
            if self.websocket_fallback {
                return self
                    .fallback(endpoint, url, api_class, request, primary, status, latency)
                    .await;
            }
            return partial(endpoint, Transport::Http, status, latency, primary);
        }

        let body = match reply.body {
            Ok(body) => body,
            Err(e) => {
                let error = if e.is_timeout() {
                    timeout_error(self.timeout)
                } else {
                    ProbeError::new(
                        ErrorKind::MalformedResponse,
                        format!("truncated body: {}", error_chain(&e)),
                    )
                };
                return partial(endpoint, Transport::Http, status, latency, error);
            }
        };

        match evaluate(api_class, &body) {
            Ok(height) => ProbeOutcome::success(endpoint, Transport::Http, status, latency, height),
            Err(error) => partial(endpoint, Transport::Http, status, latency, error),
        }
    }

    /// One WebSocket retry; its result is final for this cycle
    #[allow(clippy::too_many_arguments)]
    async fn fallback(
        &self,
        endpoint: Endpoint,
        url: &Url,
        api_class: ApiClass,
        request: &RpcRequest,
        primary: ProbeError,
        status: u16,
        latency: Duration,
    ) -> ProbeOutcome {
        let ws_url = match websocket_url(url) {
            Some(ws_url) => ws_url,
            None => {
                return partial(endpoint, Transport::WebSocketFallback, status, latency, primary);
            }
        };

        tracing::debug!("Trying WebSocket for {} after {}", endpoint.url, primary.message);

        let attempt = self.websocket_attempt(&ws_url, api_class, request).await;
        match attempt {
            Ok((height, ws_latency)) => ProbeOutcome::success(
                endpoint,
                Transport::WebSocketFallback,
                StatusCode::OK.as_u16(),
                ws_latency,
                height,
            ),
            Err(fallback_error) => {
                tracing::debug!(
                    "WebSocket fallback failed for {}: {}",
                    endpoint.url,
                    fallback_error
                );
                // The primary error stays authoritative, the fallback only adds detail
                let error = ProbeError {
                    message: format!(
                        "{}; WebSocket fallback failed: {}",
                        primary.message, fallback_error
                    ),
                    ..primary
                };
                partial(endpoint, Transport::WebSocketFallback, status, latency, error)
            }
        }
    }

    async fn probe_websocket(
        &self,
        endpoint: Endpoint,
        url: &Url,
        api_class: ApiClass,
        request: &RpcRequest,
        transport: Transport,
    ) -> ProbeOutcome {
        match self.websocket_attempt(url, api_class, request).await {
            Ok((height, latency)) => {
                ProbeOutcome::success(endpoint, transport, StatusCode::OK.as_u16(), latency, height)
            }
            Err(error) => ProbeOutcome::failure(endpoint, transport, error),
        }
    }

    async fn websocket_attempt(
        &self,
        url: &Url,
        api_class: ApiClass,
        request: &RpcRequest,
    ) -> std::result::Result<(u64, Duration), ProbeError> {
        let started = Instant::now();
        let body = tokio::time::timeout(self.timeout, websocket_round_trip(url, request))
            .await
            .map_err(|_| timeout_error(self.timeout))??;
        let latency = started.elapsed();

        evaluate(api_class, &body).map(|height| (height, latency))
    }

    async fn post(
        &self,
        url: &Url,
        request: &RpcRequest,
    ) -> std::result::Result<HttpReply, reqwest::Error> {
        let response = self
            .client
            .post(url.clone())
            .body(request.to_json())
            .send()
            .await?;

        let status = response.status();
        let trigger = FallbackTrigger::classify(status, response.headers());
        let body = response.bytes().await.map(|b| b.to_vec());

        Ok(HttpReply {
            status,
            trigger,
            body,
        })
    }
}

impl Prober for HttpProber {
    async fn probe(&self, endpoint: Endpoint) -> ProbeOutcome {
        self.probe_endpoint(endpoint).await
    }
}

/// Send one JSON-RPC request over a fresh WebSocket and wait for the reply
async fn websocket_round_trip(
    url: &Url,
    request: &RpcRequest,
) -> std::result::Result<Vec<u8>, ProbeError> {
    let (mut stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| ProbeError::new(ErrorKind::ConnectionError, format!("WebSocket connect: {}", e)))?;

    stream
        .send(Message::Text(request.to_json()))
        .await
        .map_err(|e| ProbeError::new(ErrorKind::ConnectionError, format!("WebSocket send: {}", e)))?;

    let body = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => break text.into_bytes(),
            Some(Ok(Message::Binary(data))) => break data,
            Some(Ok(Message::Close(_))) | None => {
                return Err(ProbeError::new(
                    ErrorKind::ConnectionError,
                    "WebSocket closed before reply",
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(ProbeError::new(
                    ErrorKind::ConnectionError,
                    format!("WebSocket receive: {}", e),
                ));
            }
        }
    };

    if let Err(e) = stream.close(None).await {
        tracing::trace!("WebSocket close for {} failed: {}", url, e);
    }

    Ok(body)
}

/// Decode a reply body and extract the height
pub fn evaluate(api_class: ApiClass, body: &[u8]) -> std::result::Result<u64, ProbeError> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            let text = String::from_utf8_lossy(body);
            return Err(ProbeError::new(
                ErrorKind::MalformedResponse,
                format!("{} in body {:?}", e, excerpt(&text)),
            )
            .with_code(scrape_error_code(&text)));
        }
    };

    api_class.extract_height(&value).map_err(ProbeError::from)
}

/// Pull the numeric code out of a plaintext "error code: NNNN" body
pub fn scrape_error_code(text: &str) -> Option<i64> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find(ERROR_CODE_MARKER)? + ERROR_CODE_MARKER.len();
    let digits: String = lower[start..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Map an http(s) URL onto the matching ws(s) URL
pub fn websocket_url(url: &Url) -> Option<Url> {
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Some(url.clone()),
        _ => return None,
    };
    let mut ws_url = url.clone();
    ws_url.set_scheme(scheme).ok()?;
    Some(ws_url)
}

fn partial(
    endpoint: Endpoint,
    transport: Transport,
    status: u16,
    latency: Duration,
    error: ProbeError,
) -> ProbeOutcome {
    ProbeOutcome {
        endpoint,
        http_status: Some(status),
        latency: Some(latency),
        block_height: None,
        transport,
        error: Some(error),
    }
}

fn timeout_error(timeout: Duration) -> ProbeError {
    ProbeError::new(
        ErrorKind::Timeout,
        format!("no reply within {}ms", timeout.as_millis()),
    )
}

fn classify_reqwest(e: &reqwest::Error) -> ProbeError {
    let kind = if e.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::ConnectionError
    };
    ProbeError::new(kind, error_chain(e))
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > MAX_EXCERPT {
        let cut: String = trimmed.chars().take(MAX_EXCERPT).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_code() {
        assert_eq!(scrape_error_code("error code: 1015"), Some(1015));
        assert_eq!(scrape_error_code("<html>Error Code: 520</html>"), Some(520));
        assert_eq!(scrape_error_code("Bad Gateway 502"), None);
        assert_eq!(scrape_error_code("error code: none"), None);
    }

    #[test]
    fn test_evaluate_plaintext_body() {
        let err = evaluate(ApiClass::Ethereum, b"error code: 1010").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert_eq!(err.code, Some(1010));

        let err = evaluate(ApiClass::Ethereum, br#"{"result": "0x1"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_evaluate_json_bodies() {
        assert_eq!(
            evaluate(ApiClass::Ethereum, br#"{"jsonrpc":"2.0","id":1,"result":"0x64"}"#).unwrap(),
            100
        );

        let err = evaluate(
            ApiClass::Ethereum,
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RpcError);
        assert_eq!(err.code, Some(-32005));
    }

    #[test]
    fn test_fallback_classification() {
        let empty = HeaderMap::new();
        assert_eq!(
            FallbackTrigger::classify(StatusCode::UPGRADE_REQUIRED, &empty),
            Some(FallbackTrigger::UpgradeRequired)
        );
        assert_eq!(FallbackTrigger::classify(StatusCode::OK, &empty), None);
        assert_eq!(FallbackTrigger::classify(StatusCode::BAD_REQUEST, &empty), None);

        let mut upgrade = HeaderMap::new();
        upgrade.insert(UPGRADE, HeaderValue::from_static("websocket"));
        assert_eq!(
            FallbackTrigger::classify(StatusCode::BAD_REQUEST, &upgrade),
            Some(FallbackTrigger::UpgradeOffered)
        );
        assert_eq!(FallbackTrigger::classify(StatusCode::OK, &upgrade), None);
    }

    #[test]
    fn test_websocket_url() {
        let url = Url::parse("https://rpc.example.com:8443/v1/key").unwrap();
        assert_eq!(
            websocket_url(&url).unwrap().as_str(),
            "wss://rpc.example.com:8443/v1/key"
        );

        let url = Url::parse("http://127.0.0.1:9944/").unwrap();
        assert_eq!(websocket_url(&url).unwrap().as_str(), "ws://127.0.0.1:9944/");

        let url = Url::parse("ftp://example.com").unwrap();
        assert!(websocket_url(&url).is_none());
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), MAX_EXCERPT + 3);
        assert_eq!(excerpt("  short  "), "short");
    }

    #[tokio::test]
    async fn test_invalid_api_class_needs_no_network() {
        let prober = HttpProber::new(&DispatchConfig::default()).unwrap();
        let endpoint = Endpoint::new("cosmos", "http://127.0.0.1:1", "tendermint");
        let outcome = prober.probe_endpoint(endpoint).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidApiClass));
        assert_eq!(outcome.http_status, None);
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let prober = HttpProber::new(&DispatchConfig::default()).unwrap();
        let endpoint = Endpoint::new("eth", "ftp://rpc.example.com", "ethereum");
        let outcome = prober.probe_endpoint(endpoint).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ConnectionError));
    }
}
