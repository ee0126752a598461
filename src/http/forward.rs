//! The forwarder: one inbound request in, one upstream request out, the
//! upstream response relayed back verbatim.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

use crate::http::body::{UploadBody, UploadDone};
use crate::http::client::UpstreamClient;
use crate::http::error::{ForwardError, UpstreamConfigError};
use crate::http::upstream::UpstreamBase;

/// Relays requests to a single upstream through `C`.
#[derive(Clone)]
pub struct Forwarder<C> {
    upstream: Result<UpstreamBase, UpstreamConfigError>,
    client: C,
    response_timeout: Option<Duration>,
}

impl<C: UpstreamClient> Forwarder<C> {
    pub fn new(upstream: Result<UpstreamBase, UpstreamConfigError>, client: C) -> Self {
        Self {
            upstream,
            client,
            response_timeout: None,
        }
    }

    /// Bound the wait for upstream response headers.
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Forward `request` and produce the response for the caller.
    ///
    /// Never fails: configuration problems become 500 and upstream failures
    /// become 502/504, each with a short plain-text body.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let upstream = match &self.upstream {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(error = %e, "Upstream not configured");
                return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
            }
        };

        match self.forward(upstream, request).await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Upstream responded");
                response
            }
            Err(e) => {
                tracing::error!(upstream = %upstream, error = ?e, "Upstream error");
                (e.status(), e.public_message()).into_response()
            }
        }
    }

    async fn forward(
        &self,
        upstream: &UpstreamBase,
        request: Request<Body>,
    ) -> Result<Response, ForwardError> {
        let (outbound, uploaded) = outbound_request(upstream, request)?;
        let pending = self.client.send(outbound);

        let Some(limit) = self.response_timeout else {
            return pending.await;
        };

        // The clock starts once the request body is handed over (or the
        // upstream answers early). Bodies stream for as long as they take.
        tokio::pin!(pending);
        tokio::select! {
            result = &mut pending => return result,
            _ = uploaded => {}
        }

        tokio::time::timeout(limit, pending)
            .await
            .map_err(|_| ForwardError::Timeout(limit))?
    }
}

/// Rebuild `request` against the upstream. Method, headers and body move
/// over untouched; the HTTP version is left to the client.
fn outbound_request(
    upstream: &UpstreamBase,
    request: Request<Body>,
) -> Result<(Request<Body>, UploadDone), ForwardError> {
    let (parts, body) = request.into_parts();
    let uri = upstream.target_uri(&parts.uri)?;
    let (body, uploaded) = UploadBody::wrap(body);

    let mut outbound = Request::builder().method(parts.method).uri(uri).body(body)?;
    *outbound.headers_mut() = parts.headers;
    Ok((outbound, uploaded))
}
