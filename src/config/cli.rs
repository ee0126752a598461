//! Command-line overrides layered on top of the config file.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Relay every inbound HTTP request to a single upstream", version)]
pub struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Upstream base URL; only its scheme and authority are used
    #[arg(long, env = "PROXY_URL")]
    pub upstream: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Expose a local service through cloudflared and forward to its public URL
    Tunnel(TunnelArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TunnelArgs {
    /// Local port of the service to expose
    #[arg(short, long)]
    pub port: u16,

    /// Port for cloudflared's metrics server; random in 8100-9000 if omitted
    #[arg(short, long)]
    pub metrics_port: Option<u16>,

    /// Run this named tunnel instead of a quick tunnel
    #[arg(short, long)]
    pub tunnel_id: Option<String>,

    /// cloudflared config file; takes precedence over --tunnel-id
    #[arg(long)]
    pub tunnel_config: Option<PathBuf>,

    /// Only install cloudflared, then exit
    #[arg(short, long)]
    pub download: bool,
}

impl Cli {
    /// Build the effective configuration: defaults, then the file, then flags.
    pub fn resolve(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if let Some(upstream) = &self.upstream {
            config.upstream.url = Some(upstream.clone());
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
