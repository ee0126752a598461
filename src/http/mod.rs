//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all handler)
//!     → forward.rs (config check, outbound request, relay)
//!     → upstream.rs (scheme + authority from config, path + query from request)
//!     → body.rs (signals end of upload; starts the response timeout)
//!     → client.rs (hyper client, no redirect following)
//!     → upstream response relayed to client
//! ```

pub mod body;
pub mod client;
pub mod error;
pub mod forward;
pub mod server;
pub mod upstream;

pub use client::{HyperClient, UpstreamClient};
pub use error::{ClientError, ForwardError, UpstreamConfigError};
pub use forward::Forwarder;
pub use server::HttpServer;
pub use upstream::UpstreamBase;
