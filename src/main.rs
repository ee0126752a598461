use clap::Parser;
use tokio::net::TcpListener;

use forward_proxy::config::{Cli, Command};
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::observability::logging;
use forward_proxy::{tunnel, HttpServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = cli.resolve()?;

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "forward-proxy starting"
    );

    let tunnel = match &cli.command {
        Some(Command::Tunnel(args)) => match tunnel::prepare(args).await? {
            Some(tunnel) => {
                if config.upstream.url.is_some() {
                    tracing::warn!("Tunnel URL replaces the configured upstream");
                }
                config.upstream.url = Some(tunnel.public_url().to_string());
                Some(tunnel)
            }
            None => return Ok(()),
        },
        None => None,
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        connect_timeout_secs = config.timeouts.connect_secs,
        response_timeout_secs = config.timeouts.response_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(&config)?;

    shutdown.trigger_on_signal();

    server.run(listener, server_shutdown).await?;

    if let Some(tunnel) = tunnel {
        tunnel.close().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
