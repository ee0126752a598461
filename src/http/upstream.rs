//! Upstream base address and target URI construction.
//!
//! Only the scheme and authority of the configured URL are kept. The path
//! and query of every outbound request come from the inbound request.

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;
use std::fmt;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::error::UpstreamConfigError;

/// Scheme and authority of the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBase {
    scheme: Scheme,
    authority: Authority,
}

impl UpstreamBase {
    /// Resolve the upstream from configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamConfigError> {
        match config.url.as_deref() {
            Some(raw) => Self::parse(raw),
            None => Err(UpstreamConfigError::Missing),
        }
    }

    /// Parse an upstream base URL such as `https://api.example.com`.
    ///
    /// Path, query and fragment are discarded. Default ports are dropped.
    pub fn parse(raw: &str) -> Result<Self, UpstreamConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UpstreamConfigError::Missing);
        }

        let invalid = |reason: String| UpstreamConfigError::Invalid {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => {
                return Err(UpstreamConfigError::UnsupportedScheme {
                    url: raw.to_string(),
                    scheme: other.to_string(),
                })
            }
        };

        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not supported".into()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".into()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::try_from(authority).map_err(|e| invalid(e.to_string()))?;

        Ok(Self { scheme, authority })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Point an inbound URI at the upstream, keeping its path and query verbatim.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = inbound
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for UpstreamBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
