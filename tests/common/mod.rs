//! Shared test helpers
//!
//! Plain HTTP mocks use `httpmock`. `WsNode` covers the cases httpmock cannot:
//! HTTP and WebSocket on one port, and a reply that breaks off mid-body.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

type WsRoute = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Node that answers plain HTTP with 426 and serves JSON-RPC over WebSocket
pub struct WsNode {
    addr: SocketAddr,
    http_hits: Arc<AtomicUsize>,
    ws_hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

/// How a `WsNode` behaves
#[derive(Debug, Clone, Copy, Default)]
pub struct WsNodeOptions {
    /// Send `Upgrade: websocket` with the 426
    pub offer_upgrade: bool,
    /// Delay before each WebSocket reply
    pub reply_delay: Duration,
}

impl WsNode {
    pub async fn start<F>(options: WsNodeOptions, reply: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply: WsRoute = Arc::new(reply);
        let http_hits = Arc::new(AtomicUsize::new(0));
        let ws_hits = Arc::new(AtomicUsize::new(0));

        let (http, ws) = (http_hits.clone(), ws_hits.clone());
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (reply, http, ws) = (reply.clone(), http.clone(), ws.clone());
                tokio::spawn(async move {
                    if is_upgrade(&stream).await {
                        serve_websocket(stream, options.reply_delay, reply, ws).await;
                    } else {
                        http.fetch_add(1, Ordering::SeqCst);
                        let _ = upgrade_required(stream, options.offer_upgrade).await;
                    }
                });
            }
        });

        Self {
            addr,
            http_hits,
            ws_hits,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn http_hits(&self) -> usize {
        self.http_hits.load(Ordering::SeqCst)
    }

    pub fn websocket_hits(&self) -> usize {
        self.ws_hits.load(Ordering::SeqCst)
    }
}

impl Drop for WsNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Peek at the request head without consuming it
async fn is_upgrade(stream: &TcpStream) -> bool {
    let mut buf = vec![0u8; 4096];
    for _ in 0..200 {
        let Ok(n) = stream.peek(&mut buf).await else {
            return false;
        };
        let head = String::from_utf8_lossy(&buf[..n]).to_ascii_lowercase();
        if n == 0 || head.contains("\r\n\r\n") {
            return head.contains("upgrade: websocket");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Read a JSON-RPC POST up to the end of its JSON body
async fn drain_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        data.extend_from_slice(&chunk[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            if data[pos + 4..].ends_with(b"}") {
                return Ok(());
            }
        }
    }
}

async fn upgrade_required(mut stream: TcpStream, offer_upgrade: bool) -> std::io::Result<()> {
    drain_request(&mut stream).await?;
    let upgrade = if offer_upgrade {
        "Upgrade: websocket\r\n"
    } else {
        ""
    };
    let response = format!(
        "HTTP/1.1 426 Upgrade Required\r\n{}Content-Length: 0\r\nConnection: close\r\n\r\n",
        upgrade
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

async fn serve_websocket(stream: TcpStream, delay: Duration, reply: WsRoute, hits: Arc<AtomicUsize>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let body = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8_lossy(&data).to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        hits.fetch_add(1, Ordering::SeqCst);

        let answer = reply(&body);
        tokio::time::sleep(delay).await;
        if ws.send(Message::Text(answer)).await.is_err() {
            break;
        }
    }
}

/// Node that promises a longer body than it sends, then hangs up
pub async fn truncated_body_node() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = drain_request(&mut stream).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 200\r\n\r\n{\"jsonrpc\":\"2.0\",\"res")
                .await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), handle)
}

/// A port with nothing listening on it
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// JSON-RPC reply with `result`
pub fn rpc_result(result: serde_json::Value) -> String {
    serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string()
}

/// JSON-RPC reply with an `error` object
pub fn rpc_error(code: i64, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": code, "message": message}
    })
    .to_string()
}
