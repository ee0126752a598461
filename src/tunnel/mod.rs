//! Exposing a local service through a Cloudflare quick tunnel.
//!
//! # Data Flow
//! ```text
//! platform.rs (OS/CPU → release asset)
//!     → download.rs (cached in the temp dir, fetched and unpacked if absent)
//!     → process.rs (spawn `cloudflared tunnel`, poll its metrics page)
//!     → public https://….trycloudflare.com URL becomes the proxy's upstream
//! ```

pub mod download;
pub mod platform;
pub mod process;

use rand::Rng;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::cli::TunnelArgs;

pub use download::Installer;
pub use platform::Release;
pub use process::{Discovery, Route, Tunnel, TunnelCommand};

/// Errors from preparing or running `cloudflared`.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("{arch} is not supported on {os}")]
    Unsupported { os: String, arch: String },

    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't connect to Cloudflare Edge")]
    NoEdge,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Metrics ports are picked from this range when none is given.
const METRICS_PORTS: std::ops::RangeInclusive<u16> = 8100..=9000;

impl TunnelArgs {
    /// What the tunnel should expose, in order of precedence.
    pub fn route(&self) -> Route {
        match (&self.tunnel_config, &self.tunnel_id) {
            (Some(path), _) => Route::ConfigFile(path.clone()),
            (None, Some(tunnel_id)) => Route::Named {
                local_port: self.port,
                tunnel_id: tunnel_id.clone(),
            },
            (None, None) => Route::Quick {
                local_port: self.port,
            },
        }
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
            .unwrap_or_else(|| rand::thread_rng().gen_range(METRICS_PORTS))
    }
}

/// Install `cloudflared` and, unless only a download was asked for, open a
/// tunnel to the local port.
pub async fn prepare(args: &TunnelArgs) -> Result<Option<Tunnel>, TunnelError> {
    let release = Release::current()?;
    let executable = Installer::new(std::env::temp_dir())?
        .ensure(&release)
        .await?;
    tracing::info!(executable = %executable.display(), "cloudflared is installed");

    if args.download {
        return Ok(None);
    }

    let command = TunnelCommand::new(executable, &release, args.metrics_port(), args.route());
    Tunnel::open(&command, &Discovery::default()).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> TunnelArgs {
        TunnelArgs {
            port: 3000,
            metrics_port: None,
            tunnel_id: None,
            tunnel_config: None,
            download: false,
        }
    }

    #[test]
    fn config_file_wins_over_tunnel_id() {
        let args = TunnelArgs {
            tunnel_id: Some("6ff42ae2".into()),
            tunnel_config: Some("/etc/cloudflared/config.yml".into()),
            ..args()
        };
        assert_eq!(
            args.route(),
            Route::ConfigFile("/etc/cloudflared/config.yml".into())
        );
    }

    #[test]
    fn tunnel_id_selects_named_tunnel() {
        let args = TunnelArgs {
            tunnel_id: Some("6ff42ae2".into()),
            ..args()
        };
        assert_eq!(
            args.route(),
            Route::Named {
                local_port: 3000,
                tunnel_id: "6ff42ae2".into()
            }
        );
    }

    #[test]
    fn defaults_to_quick_tunnel() {
        assert_eq!(args().route(), Route::Quick { local_port: 3000 });
    }

    #[test]
    fn metrics_port_is_random_within_range_unless_given() {
        for _ in 0..100 {
            assert!(METRICS_PORTS.contains(&args().metrics_port()));
        }
        let fixed = TunnelArgs {
            metrics_port: Some(9100),
            ..args()
        };
        assert_eq!(fixed.metrics_port(), 9100);
    }
}
