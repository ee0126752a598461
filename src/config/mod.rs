//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file)
//!     → cli.rs (--listen, --upstream / PROXY_URL, `tunnel` subcommand)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the upstream is read once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::{Cli, Command, TunnelArgs};
pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig, UpstreamConfig};
