//! Request Catcher (v1)
//!
//! Records every inbound HTTP request and replays it to observers.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────────┐
//!                      │                   REQUEST CATCHER                      │
//!                      │                                                        │
//!  Any request ────────┼─▶ capture listener ──▶ normalizer ──▶ pipeline         │
//!                      │    /requests  /static/*     │            │  │  │       │
//!                      │                           blob dir        │  │  │       │
//!                      │                                           ▼  │  ▼       │
//!                      │                                      history │ records  │
//!                      │                                         │    │  dir     │
//!                      │                                         │    ▼          │
//!  Observer ◀──────────┼── management listener ◀─────────────────┘  broadcast    │
//!   /view-requests     │        /sse ◀───────────────────────────────── hub      │
//!                      │                                                        │
//!                      └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_catcher::config::{load_config, CatcherConfig};
use request_catcher::lifecycle::{signals, Shutdown};
use request_catcher::observability::{logging, metrics};
use request_catcher::HttpServer;

#[derive(Parser)]
#[command(name = "request-catcher")]
#[command(about = "Capture, persist and live-stream every inbound HTTP request", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CatcherConfig::default(),
    };

    logging::init(&config.observability, cli.log_level.as_deref())?;

    tracing::info!("request-catcher v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        capture_address = %config.capture.bind_address,
        management_address = %config.management.bind_address,
        records_dir = %config.storage.records_dir,
        blobs_dir = %config.storage.blobs_dir,
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

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone(), &shutdown).await?;

    let capture_listener = TcpListener::bind(&config.capture.bind_address).await?;
    let management_listener = TcpListener::bind(&config.management.bind_address).await?;

    tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(capture_listener, management_listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
