//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use axum::{body::Body, http::Request, Json, Router};
use forward_proxy::{HttpServer, ProxyConfig, Shutdown};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn bind_local() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

/// Start the proxy on an ephemeral port, forwarding to `upstream`.
pub async fn start_proxy(upstream: Option<String>) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.upstream.url = upstream;
    start_proxy_with(config).await
}

/// Start the proxy on an ephemeral port with a prepared config.
pub async fn start_proxy_with(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Client that never follows redirects and ignores system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Backend that describes the request it received as JSON.
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(request: Request<Body>) -> Json<Value> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let headers: Vec<(String, String)> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Json(json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "headers": headers,
            "body_len": body.len(),
        }))
    }

    serve(Router::new().fallback(echo)).await
}

/// Backend that answers with the request body it received.
pub async fn start_mirror_backend() -> SocketAddr {
    async fn mirror(request: Request<Body>) -> axum::response::Response {
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        axum::response::Response::new(Body::from(body))
    }

    serve(Router::new().fallback(mirror)).await
}

/// Backend that reads one request head and writes `response` byte for byte.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}

/// Backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = bind_local().await;
    listener.local_addr().unwrap()
}

/// Send `request` as raw bytes to `addr` and return everything written back.
///
/// The request should carry `Connection: close` so the reply ends with EOF.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut reply))
        .await
        .expect("proxy closed the connection")
        .unwrap();
    String::from_utf8_lossy(&reply).into_owned()
}
