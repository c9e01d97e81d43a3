mod api;
mod error;
mod geocode;
mod scheduler;

use anyhow::Context;

use beaconhub_core::SqliteBeaconStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = beaconhub_config::load_from_env().context("load configuration")?;

    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }
    }

    let store = SqliteBeaconStore::open(&config.database_path)
        .with_context(|| format!("open beacon store at {}", config.database_path))?;
    tracing::info!(path = %config.database_path, "beacon store ready");

    scheduler::spawn_passes(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.http.bind_addr))?;
    tracing::info!(addr = %config.http.bind_addr, "serving live map endpoints");

    axum::serve(listener, api::router(api::AppState::new(store)))
        .await
        .context("serve http")?;

    Ok(())
}
