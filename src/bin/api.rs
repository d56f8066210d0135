//! Bolus History API Server
//!
//! Run with: cargo run --bin bolus-history-api [CONFIG]
//!
//! # Configuration
//!
//! Reads `CONFIG` when given, otherwise the default locations
//! (`~/.config/bolus-history/config.toml`, `./config.toml`).
//!
//! Environment variables:
//! - `BOLUS_DATABASE`: SQLite database file
//! - `BOLUS_API_HOST`: Host to bind to (default: 127.0.0.1)
//! - `BOLUS_API_PORT`: Port to listen on (default: 8090)
//! - `BOLUS_LOG_LEVEL`, `BOLUS_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Log filter (overrides `BOLUS_LOG_LEVEL`)

use anyhow::Context;
use bolus_history::api::{serve, AppState};
use bolus_history::config::Config;
use bolus_history::logging;
use bolus_history::storage::Store;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_with_env(&path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging);

    tracing::info!("Starting bolus history API server v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config.storage.path();
    tracing::info!("Database: {}", db_path.display());

    let store = Arc::new(
        Store::open(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?,
    );
    match store.stats() {
        Ok(stats) => tracing::info!("Store holds {}", stats),
        Err(e) => tracing::warn!("Could not read store statistics: {}", e),
    }

    let state = AppState::new(store, config.api.clone());

    tracing::info!("Starting server on {}", config.api.addr());
    serve(state, &config.api).await?;

    tracing::info!("Bolus history API server stopped");
    Ok(())
}
