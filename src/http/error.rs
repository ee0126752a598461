//! Error types for the forwarding path.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Boxed error from whatever client carried the upstream request.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why the upstream base URL cannot be used.
///
/// Requests are answered with 500 while the upstream is in this state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamConfigError {
    #[error("PROXY_URL is not configured")]
    Missing,

    #[error("PROXY_URL {url:?} is not a valid upstream URL: {reason}")]
    Invalid { url: String, reason: String },

    #[error("PROXY_URL {url:?} has unsupported scheme {scheme:?} (expected http or https)")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Failure to obtain a response from the upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    /// Status code returned to the caller for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Plain-text body returned to the caller. Details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ForwardError::Request(_) => "Failed to build upstream request",
            ForwardError::Upstream(_) => "Upstream request failed",
            ForwardError::Timeout(_) => "Upstream timed out",
        }
    }
}

/// Failure to construct the outbound HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("TLS client configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}
