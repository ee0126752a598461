//! Running `cloudflared` and learning the public URL it was given.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::tunnel::platform::Release;
use crate::tunnel::TunnelError;

/// Host that quick tunnels are published under.
const QUICK_TUNNEL_DOMAIN: &str = ".trycloudflare.com";

/// How `cloudflared` decides what to expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Everything comes from a `cloudflared` config file.
    ConfigFile(PathBuf),
    /// A pre-created named tunnel serving the local port.
    Named { local_port: u16, tunnel_id: String },
    /// An anonymous quick tunnel serving the local port.
    Quick { local_port: u16 },
}

/// A fully described `cloudflared tunnel` invocation.
#[derive(Debug, Clone)]
pub struct TunnelCommand {
    pub executable: PathBuf,
    pub metrics_port: u16,
    pub route: Route,
    pub needs_x86_64_translation: bool,
}

impl TunnelCommand {
    pub fn new(executable: PathBuf, release: &Release, metrics_port: u16, route: Route) -> Self {
        Self {
            executable,
            metrics_port,
            route,
            needs_x86_64_translation: release.needs_x86_64_translation,
        }
    }

    /// Program and arguments to spawn.
    pub fn argv(&self) -> (OsString, Vec<OsString>) {
        let mut args: Vec<OsString> = vec![
            "tunnel".into(),
            "--metrics".into(),
            format!("127.0.0.1:{}", self.metrics_port).into(),
        ];

        match &self.route {
            Route::ConfigFile(path) => {
                args.extend([OsString::from("--config"), path.into(), "run".into()]);
            }
            Route::Named {
                local_port,
                tunnel_id,
            } => {
                args.extend([
                    OsString::from("--url"),
                    format!("http://127.0.0.1:{local_port}").into(),
                    "run".into(),
                    tunnel_id.into(),
                ]);
            }
            Route::Quick { local_port } => {
                args.extend([
                    OsString::from("--url"),
                    format!("http://127.0.0.1:{local_port}").into(),
                ]);
            }
        }

        if self.needs_x86_64_translation {
            let mut translated: Vec<OsString> = vec!["-x86_64".into(), self.executable.clone().into()];
            translated.extend(args);
            return ("arch".into(), translated);
        }
        (self.executable.clone().into(), args)
    }

    pub fn metrics_url(&self) -> String {
        format!("http://127.0.0.1:{}/metrics", self.metrics_port)
    }
}

/// Polling schedule for the metrics endpoint.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(3),
        }
    }
}

/// First `http(s)://…trycloudflare.com` URL in a metrics page.
pub fn find_tunnel_url(metrics: &str) -> Option<&str> {
    metrics.split_whitespace().find_map(|token| {
        let start = ["https://", "http://"]
            .iter()
            .filter_map(|scheme| token.find(scheme))
            .min()?;
        let candidate = &token[start..];
        let host_start = candidate.find("://")? + 3;
        let end = candidate.rfind(QUICK_TUNNEL_DOMAIN)?;
        (end > host_start).then(|| &candidate[..end + QUICK_TUNNEL_DOMAIN.len()])
    })
}

/// Poll `metrics_url` until it names a quick tunnel URL.
pub async fn discover_url(
    client: &reqwest::Client,
    metrics_url: &str,
    discovery: &Discovery,
) -> Result<String, TunnelError> {
    for attempt in 1..=discovery.attempts {
        match client.get(metrics_url).send().await {
            Ok(response) => match response.text().await {
                Ok(metrics) => {
                    if let Some(url) = find_tunnel_url(&metrics) {
                        return Ok(url.to_string());
                    }
                    tracing::debug!(attempt, "Tunnel URL not published yet");
                }
                Err(e) => tracing::debug!(attempt, error = %e, "Metrics body unreadable"),
            },
            Err(e) => tracing::debug!(attempt, error = %e, "Metrics endpoint not reachable yet"),
        }
        tokio::time::sleep(discovery.interval).await;
    }
    Err(TunnelError::NoEdge)
}

/// A running `cloudflared`. Dropping it kills the process.
#[derive(Debug)]
pub struct Tunnel {
    child: Child,
    public_url: String,
    metrics_url: String,
}

impl Tunnel {
    /// Start `command` and wait for its public URL.
    pub async fn open(command: &TunnelCommand, discovery: &Discovery) -> Result<Self, TunnelError> {
        let (program, args) = command.argv();
        tracing::info!(program = ?program, args = ?args, "Starting cloudflared");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: PathBuf::from(&program),
                source,
            })?;

        let client = reqwest::Client::builder().no_proxy().build()?;
        let metrics_url = command.metrics_url();
        let public_url = match discover_url(&client, &metrics_url, discovery).await {
            Ok(url) => url,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        tracing::info!(url = %public_url, metrics = %metrics_url, "Tunnel is up");
        Ok(Self {
            child,
            public_url,
            metrics_url,
        })
    }

    /// The `https://…trycloudflare.com` address traffic arrives on.
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Where `cloudflared` publishes traffic statistics.
    pub fn metrics_url(&self) -> &str {
        &self.metrics_url
    }

    /// Stop `cloudflared` and wait for it to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "cloudflared did not stop cleanly");
        }
    }
}
