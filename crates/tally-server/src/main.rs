//! Tally Server - Main entry point

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tally_common::logging::{init_logging, LogConfig};
use tally_engine::{AggregationEngine, JobRegistry};
use tokio::signal;
use tracing::info;

use tally_server::{app, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Server defaults first, then environment variables take precedence
    let log_config = LogConfig::builder()
        .log_file_prefix("tally-server".to_string())
        .filter_directives("tally_server=debug,tally_engine=debug,tower_http=debug".to_string())
        .build()
        .with_env_overrides()?;

    init_logging(&log_config)?;

    info!("Starting Tally Server");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // The engine creates the result directory; the upload directory is ours.
    tokio::fs::create_dir_all(&config.jobs.upload_dir).await?;

    let registry = JobRegistry::default();
    let engine = AggregationEngine::new(registry, config.engine_config())?;
    info!(
        max_concurrent_jobs = config.jobs.max_concurrent_jobs,
        max_pending_jobs = config.jobs.max_pending_jobs,
        "Aggregation engine initialized"
    );

    // Build the application router
    let app = app::create_router(engine, &config);

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give ongoing requests time to complete
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
