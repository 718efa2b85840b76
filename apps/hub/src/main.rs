//! # Hub Server Entry Point
//!
//! Startup order: logging, config, store (fatal on failure), engines,
//! listener (fatal on bind failure). Graceful shutdown stops the engines,
//! WAL-checkpoints the store, and closes the listener. Exit code 0 on a
//! clean shutdown, non-zero on startup failure.

use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use harbor_db::{Database, DbConfig};
use harbor_hub::{build_router, build_state};
use harbor_sync::HubConfig;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = HubConfig::load_or_default(None);
    let db_path = config.resolved_db_path();
    let http_port = config.http_port;
    let shared_config = config.into_shared();

    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!(?e, path = %db_path.display(), "Cannot create data directory");
            return ExitCode::from(1);
        }
    }

    // A store that cannot open is fatal
    let db = match Database::new(DbConfig::new(&db_path)).await {
        Ok(db) => db,
        Err(e) => {
            error!(?e, path = %db_path.display(), "Database initialization failed");
            return ExitCode::from(1);
        }
    };

    let (state, push_engine, pull_engine) = match build_state(db.clone(), shared_config) {
        Ok(parts) => parts,
        Err(e) => {
            error!(?e, "Failed to build application state");
            return ExitCode::from(1);
        }
    };

    tokio::spawn(push_engine.run());
    tokio::spawn(pull_engine.run());

    let router = build_router(state.clone());

    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(?e, addr = %bind_addr, "Port bind failed");
            return ExitCode::from(1);
        }
    };

    info!(addr = %bind_addr, "Harbor hub listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await;

    // Engines finish their current batch/cycle, then the store checkpoints.
    if let Err(e) = state.push.shutdown().await {
        error!(?e, "Push engine shutdown failed");
    }
    if let Err(e) = state.pull.shutdown().await {
        error!(?e, "Pull engine shutdown failed");
    }
    db.close().await;

    match serve_result {
        Ok(()) => {
            info!("Harbor hub stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(?e, "Server error");
            ExitCode::from(1)
        }
    }
}
