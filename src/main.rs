// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::application::event_dispatch::{EventDispatcher, HostBridge};
use crate::application::history_service::HistoryService;
use crate::application::mirror_store::MirrorStore;
use crate::application::preferences_service::PreferencesService;
use crate::application::rate_monitor::RateMonitor;
use crate::application::state_store::ReactiveStore;
use crate::application::sync_bridge::SyncBridge;
use crate::application::telemetry_ingest::TelemetryIngest;
use crate::infrastructure::config::load_monitor_config;
use crate::infrastructure::file_store::JsonFileStore;
use crate::infrastructure::host_bridge::{StdioHostBridge, spawn_stdin_listener};
use crate::presentation::app_state::AppState;
use crate::presentation::router::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the host bridge, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = load_monitor_config()?;

    // Persistence (infrastructure layer)
    let preferences_store = Arc::new(JsonFileStore::new(&config.storage.path));
    tracing::info!(path = %preferences_store.path().display(), "Using preferences file");

    // Services (application layer)
    let store = Arc::new(ReactiveStore::new());
    let rate = RateMonitor::new(config.rate.damping);
    let ingest = TelemetryIngest::new(store.clone(), rate.clone());
    let history = HistoryService::new(config.history.max_samples, config.history.bar_window_ms);
    let preferences = PreferencesService::new(preferences_store);
    let host: Option<Arc<dyn HostBridge>> = if config.host.enabled {
        Some(Arc::new(StdioHostBridge::stdout()))
    } else {
        None
    };
    let dispatcher = EventDispatcher::new(host);
    let sync = SyncBridge::new(store.clone(), preferences.clone());

    // Background tasks, all stopped through one shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = vec![
        rate.spawn(config.rate.tick(), shutdown_rx.clone()),
        history.spawn_recorder(store.record_queue(), shutdown_rx.clone()),
        sync.spawn(
            config.sync.liveness_poll(),
            config.sync.stopwatch_tick(),
            shutdown_rx.clone(),
        ),
    ];
    if config.host.enabled {
        tasks.push(spawn_stdin_listener(ingest.clone(), shutdown_rx.clone()));
    }

    let state = Arc::new(AppState {
        store,
        ingest,
        history,
        preferences,
        dispatcher,
        sync,
        mirror: Arc::new(MirrorStore::new()),
        rate,
        ema_alpha: config.history.ema_alpha,
    });

    // Router (presentation layer)
    let router = create_router(state);

    let addr: SocketAddr = config.server.bind_addr.parse()?;
    tracing::info!("Starting tah-monitor on {}", addr);

    let mut server_shutdown = shutdown_rx.clone();
    let server = axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        });

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
        tracing::info!("Shutting down");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!("Background task ended abnormally: {}", e);
        }
    }

    Ok(())
}
