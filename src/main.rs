//! Pipeline Gateway
//!
//! A single-endpoint HTTP gateway for batched SQL, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  PIPELINE GATEWAY                 │
//!                         │                                                   │
//!   POST /v2/pipeline     │  ┌─────────┐   ┌─────────┐   ┌──────────────┐    │
//!   ──────────────────────┼─▶│  http   │──▶│  auth   │──▶│   pipeline   │    │
//!                         │  │ server  │   │  gate   │   │   handler    │    │
//!                         │  └─────────┘   └─────────┘   └──────┬───────┘    │
//!                         │                                     │ per item   │
//!                         │                                     ▼            │
//!                         │                              ┌──────────────┐    │
//!                         │                              │  dispatcher  │    │
//!                         │                              └──────┬───────┘    │
//!                         │                                     ▼            │
//!   envelope              │  ┌─────────┐   ┌─────────┐   ┌──────────────┐    │
//!   ◀─────────────────────┼──│response │◀──│ row /   │◀──│   database   │    │
//!                         │  │         │   │ value   │   │   (SQLite)   │    │
//!                         │  └─────────┘   └─────────┘   └──────────────┘    │
//!                         │                                                   │
//!                         │   config · observability · lifecycle              │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use pipeline_gateway::config::{load_config, ConfigWatcher};
use pipeline_gateway::lifecycle::Shutdown;
use pipeline_gateway::observability::{logging, metrics};
use pipeline_gateway::{HttpServer, SqliteDatabase};

#[derive(Parser)]
#[command(name = "pipeline-gateway", version)]
#[command(about = "HTTP gateway for batched SQL over the pipeline protocol", long_about = None)]
struct Args {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pipeline-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        region = config.deployment.region.as_deref().unwrap_or("unknown"),
        database_path = %config.database.path,
        auth_enabled = config.auth.token.is_some(),
        statement_timeout_ms = config.timeouts.statement_ms,
        "Configuration loaded"
    );

    if let Some(sync_url) = &config.database.sync_url {
        tracing::warn!(
            sync_url = %sync_url,
            sync_interval_secs = config.database.sync_interval_secs,
            "Replication is managed outside the gateway; serving the local database file"
        );
    }

    let db = Arc::new(SqliteDatabase::open(&config.database)?);

    if config.observability.metrics_enabled {
        let addr: std::net::SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run(config.clone())?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, db);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
