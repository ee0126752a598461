//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Define the seam the forwarder sends requests through
//! - Build the pooled hyper client used in production (HTTP and HTTPS)
//!
//! # Design Decisions
//! - The hyper legacy client never follows redirects, so 3xx responses reach
//!   the caller untouched
//! - The client only adds `Host` when the request carries none
//! - Response bodies are wrapped, never collected

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::future::Future;

use crate::config::TimeoutConfig;
use crate::http::error::{ClientError, ForwardError};

/// Something that can carry one request to the upstream and hand back its response.
pub trait UpstreamClient: Clone + Send + Sync + 'static {
    fn send(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send;
}

/// Pooled hyper client speaking HTTP/1.1 over plain TCP or rustls.
#[derive(Clone)]
pub struct HyperClient {
    inner: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperClient {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, ClientError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(timeouts.connect());

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(timeouts.idle())
            .build(https);

        Ok(Self { inner })
    }
}

impl UpstreamClient for HyperClient {
    fn send(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send {
        let pending = self.inner.request(request);
        async move {
            let response = pending
                .await
                .map_err(|e| ForwardError::Upstream(Box::new(e)))?;
            Ok(response.map(Body::new))
        }
    }
}
