//! HTTP forwarding relay.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request                ┌──────────────────────────────────────────────┐
//!     GET /proxy?url=<target> ─────▶│  http::server  →  relay::engine              │
//!                                   │                     │ target + policy        │
//!                                   │                     │ outbound request       │
//!                                   │                     ▼                        │
//!                                   │               relay::transport ──────────────┼──▶ Target
//!                                   │                     │                        │
//!     Client Response               │                     ▼                        │
//!     ◀─────────────────────────────│  http::sink  ◀  redirect rewrite / stream    │◀── Response
//!                                   │                                              │
//!                                   │  config (TOML + hot reload) · observability  │
//!                                   │  lifecycle (signals, graceful drain)         │
//!                                   └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use http_relay::config::{load_config, watcher::ConfigWatcher, RelayConfig};
use http_relay::http::HttpServer;
use http_relay::lifecycle::{signals, Shutdown};
use http_relay::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "http-relay", version, about = "HTTP forwarding relay")]
struct Cli {
    /// Path to a TOML configuration file; watched for changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_tracing(&config.observability);

    tracing::info!("http-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.relay.path,
        target_param = %config.relay.target_param,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
