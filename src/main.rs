//! Smart Balancer
//!
//! A health-aware HTTP load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  SMART BALANCER                  │
//!                        │                                                  │
//!   Client Request       │  ┌─────────┐    ┌──────────────┐    ┌─────────┐  │
//!   ─────────────────────┼─▶│  http   │───▶│   routing    │───▶│ forward │──┼──▶ Backend
//!                        │  │ server  │    │ RequestRouter│    │         │  │
//!                        │  └─────────┘    └──────┬───────┘    └─────────┘  │
//!                        │                        │                         │
//!                        │                        ▼                         │
//!                        │                ┌──────────────┐                  │
//!                        │                │load_balancer │                  │
//!                        │                │  scheduler   │                  │
//!                        │                └──────┬───────┘                  │
//!                        │          ┌────────────┼─────────────┐            │
//!                        │          ▼            ▼             ▼            │
//!                        │     ┌────────┐   ┌─────────┐   ┌─────────┐       │
//!                        │     │registry│   │ health  │   │ weights │       │
//!                        │     │        │   │ monitor │   │ history │       │
//!                        │     └────────┘   └─────────┘   └─────────┘       │
//!                        │                                                  │
//!                        │  config · admin · observability · lifecycle      │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use smart_balancer::config::{load_config, watcher::ConfigWatcher, BalancerConfig};
use smart_balancer::lifecycle::{wait_for_signal, Shutdown};
use smart_balancer::observability::{logging, metrics};
use smart_balancer::HttpServer;

#[derive(Parser)]
#[command(name = "smart-balancer", version, about = "Health-aware HTTP load balancer")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!("smart-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        algorithm = %config.balancer.algorithm,
        backends = config.backends.len(),
        health_interval_ms = config.health_check.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (updates, _watcher) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        _ => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_task = tokio::spawn(server.run(listener, updates, shutdown.subscribe()));

    let signal = wait_for_signal().await?;
    tracing::info!(signal, "Shutdown signal received");
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
