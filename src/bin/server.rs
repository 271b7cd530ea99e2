//! seriescount server binary
//!
//! Serves cardinality queries over gRPC and HTTP from an in-memory series
//! index fed by line protocol writes.

use seriescount::api::{self, ApiServerConfig};
use seriescount::config::ServerConfig;
use seriescount::contract::SourcePolicy;
use seriescount::query::CardinalityEngine;
use seriescount::storage::DatabaseStore;
use seriescount::telemetry::Telemetry;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// seriescount server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// gRPC listen address (overrides SERIESCOUNT_GRPC_ADDR)
    #[arg(long)]
    grpc_addr: Option<SocketAddr>,

    /// HTTP listen address (overrides SERIESCOUNT_HTTP_ADDR)
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Unknown source handling: permissive or strict
    #[arg(long)]
    source_policy: Option<SourcePolicy>,

    /// Disable CORS on the HTTP API
    #[arg(long)]
    no_cors: bool,

    /// Log level or filter directive
    #[arg(long, env = "SERIESCOUNT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("seriescount-server", &args.log_level)?;

    info!("Starting seriescount server");

    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.grpc_addr {
        config.grpc_addr = addr;
    }
    if let Some(addr) = args.http_addr {
        config.http_addr = addr;
    }
    if let Some(policy) = args.source_policy {
        config.query.source_policy = policy;
    }
    if args.no_cors {
        config.enable_cors = false;
    }
    config.validate()?;

    let store = Arc::new(DatabaseStore::new());
    let engine = Arc::new(CardinalityEngine::new(config.query.clone(), store));

    let router = api::build_http_router(engine.clone(), &ApiServerConfig::from(&config));
    let http_listener = TcpListener::bind(config.http_addr).await?;
    let grpc_listener = TcpListener::bind(config.grpc_addr).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_shutdown = shutdown_rx.clone();
    let grpc_shutdown = shutdown_rx;
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!(
        http_addr = %http_listener.local_addr()?,
        grpc_addr = %grpc_listener.local_addr()?,
        source_policy = config.query.source_policy.as_str(),
        enable_cors = config.enable_cors,
        "Server ready"
    );

    let http_server = api::serve_http(http_listener, router, http_shutdown);
    let grpc_server = api::grpc::run_grpc_server_on(
        grpc_listener,
        engine,
        config.max_message_size,
        grpc_shutdown,
    );
    tokio::try_join!(http_server, grpc_server)?;

    info!("Server shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
