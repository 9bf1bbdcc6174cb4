use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use stormwatch_alert::limiter::CooldownTracker;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

use stormwatch_server::state::AppState;
use stormwatch_server::{app, channels, config};
use stormwatch_storage::AlertStore;

#[tokio::main]
async fn main() -> Result<()> {
    stormwatch_common::id::configure(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stormwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/server.toml");
    run_server(config_path).await
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = if std::path::Path::new(config_path).exists() {
        config::ServerConfig::load(config_path)?
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
        config::ServerConfig::default()
    };

    tracing::info!(
        http_port = config.http_port,
        db = %config.database.redacted_url(),
        "stormwatch-server starting"
    );

    std::fs::create_dir_all(&config.database.data_dir)?;
    let store = Arc::new(AlertStore::new(&config.database.connection_url()).await?);

    // Deliveries interrupted by the previous shutdown
    let grace = chrono::Duration::seconds(config.delivery.pending_grace_secs as i64);
    match store.reconcile_stale_pending(grace).await {
        Ok(0) => {}
        Ok(reconciled) => {
            tracing::warn!(reconciled, "Marked stale pending deliveries as failed");
        }
        Err(e) => tracing::error!(error = %e, "Stale pending reconciliation failed"),
    }

    let dispatcher = Arc::new(channels::build_dispatcher(&config)?);

    let state = AppState {
        store: store.clone(),
        limiter: Arc::new(CooldownTracker::default()),
        dispatcher,
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    // Periodic history retention cleanup
    let retention_days = config.delivery.retention_days;
    let purge_interval_secs = config.delivery.purge_interval_secs;
    let purge_store = store.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(purge_interval_secs));
        loop {
            tick.tick().await;
            match purge_store.purge_deliveries_older_than(retention_days).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "Purged expired delivery history")
                }
                Err(e) => tracing::error!(error = %e, "Delivery history purge failed"),
                _ => {}
            }
        }
    });

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let http_server = axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    if let Err(e) = http_server
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }

    cleanup_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
