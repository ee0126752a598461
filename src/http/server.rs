//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all forwarding handler
//! - Wire up middleware (tracing)
//! - Serve on a listener until shutdown is broadcast

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::http::client::{HyperClient, UpstreamClient};
use crate::http::error::ClientError;
use crate::http::forward::Forwarder;
use crate::http::upstream::UpstreamBase;

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server forwarding through the production hyper client.
    pub fn new(config: &ProxyConfig) -> Result<Self, ClientError> {
        let client = HyperClient::new(&config.timeouts)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a new HTTP server forwarding through `client`.
    pub fn with_client<C: UpstreamClient>(config: &ProxyConfig, client: C) -> Self {
        let upstream = UpstreamBase::from_config(&config.upstream);
        match &upstream {
            Ok(base) => tracing::info!(upstream = %base, "Forwarding to upstream"),
            Err(e) => tracing::warn!(
                error = %e,
                "Upstream unusable; every request will be answered with 500"
            ),
        }

        let forwarder =
            Forwarder::new(upstream, client).with_response_timeout(config.timeouts.response());
        let router = Self::build_router(forwarder);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router<C: UpstreamClient>(forwarder: Forwarder<C>) -> Router {
        Router::new()
            .fallback(proxy_handler::<C>)
            .with_state(Arc::new(forwarder))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Main proxy handler. Every method and path lands here.
async fn proxy_handler<C: UpstreamClient>(
    State(forwarder): State<Arc<Forwarder<C>>>,
    request: Request<Body>,
) -> Response {
    let span = tracing::info_span!(
        "forward",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move { forwarder.handle(request).await }
        .instrument(span)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::ForwardError;
    use axum::http::{Method, Response as HttpResponse, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Answers 204 and echoes the target URI in a header.
    #[derive(Clone, Default)]
    struct EchoUriClient {
        calls: Arc<AtomicUsize>,
    }

    impl UpstreamClient for EchoUriClient {
        fn send(
            &self,
            request: Request<Body>,
        ) -> impl std::future::Future<Output = Result<HttpResponse<Body>, ForwardError>> + Send
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let target = request.uri().to_string();
            async move {
                Ok(HttpResponse::builder()
                    .status(StatusCode::NO_CONTENT)
                    .header("x-target", target)
                    .body(Body::empty())
                    .unwrap())
            }
        }
    }

    fn configured(url: Option<&str>) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.url = url.map(String::from);
        config
    }

    #[tokio::test]
    async fn every_method_and_path_is_forwarded() {
        let client = EchoUriClient::default();
        let server =
            HttpServer::with_client(&configured(Some("https://api.example.com")), client.clone());

        for (method, uri) in [
            (Method::GET, "/"),
            (Method::DELETE, "/deep/nested/path?q=1&q=2"),
            (Method::OPTIONS, "/cors"),
            (Method::from_bytes(b"PURGE").unwrap(), "/cache/key"),
        ] {
            let response = server
                .router()
                .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert_eq!(
                response.headers()["x-target"],
                format!("https://api.example.com{uri}").as_str()
            );
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn unconfigured_server_answers_500() {
        let client = EchoUriClient::default();
        let server = HttpServer::with_client(&configured(None), client.clone());

        let response = server
            .router()
            .oneshot(Request::get("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
