//! Single-upstream forwarding proxy.
//!
//! Every inbound request is re-targeted at the configured upstream (its
//! scheme and authority, the request's own path and query), forwarded with
//! method, headers and body unchanged, and the upstream response is relayed
//! back as-is. Redirects are never followed.
//!
//! The `tunnel` module can instead expose a local service through
//! `cloudflared` and forward to the public URL it is given.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod tunnel;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
