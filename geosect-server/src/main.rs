//! geosect-server - geological sections service
//!
//! Stores sections with their geological classes and runs spreadsheet
//! import/export jobs in the background.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use geosect_common::config::{CliOverrides, ServiceConfig};
use tokio::signal;
use tracing::info;

use geosect_server::db::{self, SqliteSectionStore};
use geosect_server::services::{FileJobs, JobRegistry};
use geosect_server::{build_router, AppState};

/// Command-line arguments for geosect-server
#[derive(Parser, Debug)]
#[command(name = "geosect-server")]
#[command(about = "Geological sections service with spreadsheet import/export")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "GEOSECT_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "GEOSECT_BIND")]
    bind: Option<String>,

    /// Root folder holding the database and export files
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "GEOSECT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::load(&CliOverrides {
        root_folder: args.root_folder,
        port: args.port,
        bind_address: args.bind,
        config_path: args.config,
    });

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting geosect-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config.log_source();
    info!("Root folder: {}", config.root_folder.display());

    config
        .ensure_directories()
        .context("Failed to initialize root folder")?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = db::init_database_pool(&db_path).await?;

    let store = Arc::new(SqliteSectionStore::new(pool, config.database_max_lock_wait_ms));
    let jobs = FileJobs::new(store.clone(), JobRegistry::new(), config.exports_dir());
    info!("Export directory: {}", jobs.export_dir().display());

    let state = AppState::new(store, jobs).with_max_upload_bytes(config.max_upload_bytes);
    let app = build_router(state);

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
