use anyhow::Result;
use shortfeed::capability::Unavailable;
use shortfeed::config::Config;
use shortfeed::events::EventSink;
use shortfeed::player::headless::HeadlessEngine;
use shortfeed::ui::UiContext;
use shortfeed::{DaemonState, Engine, ipc_server};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Outward events buffered per subscriber before it starts lagging
const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_config_path()?;
    let (config, load_error) = match Config::load() {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    log::info!("Starting shortfeed daemon v{}", env!("CARGO_PKG_VERSION"));

    match load_error {
        None => {
            log::info!("Configuration loaded from {}", config_path.display());
            log::info!("  - Pre-bind distance: {}", config.feed.pre_bind_distance);
            log::info!("  - Default loop: {}", config.feed.default_loop);
            log::info!(
                "  - Dimension retries: {} every {}ms",
                config.dimensions.max_retries,
                config.dimensions.retry_delay_ms
            );
        }
        Some(e) => {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
        }
    }

    let (ui, ui_handle) = UiContext::spawn();
    let (sink, event_rx) = EventSink::channel();
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
    tokio::spawn(ipc_server::pump_events(event_rx, event_tx.clone()));

    let player = Arc::new(HeadlessEngine::new(
        config.headless.default_width,
        config.headless.default_height,
    ));
    let engine = Arc::new(Engine::new(
        player,
        ui,
        sink,
        Box::new(Unavailable),
        config.feed_settings(),
    ));

    engine.set_configuration(&config.player);
    if let Some(ref info) = config.enhancement {
        engine.probe_optional_capability(info);
    }

    let state = Arc::new(Mutex::new(DaemonState::new()));

    // Start IPC server
    let ipc_state = state.clone();
    let ipc_engine = engine.clone();
    let ipc_handle = tokio::spawn(async move {
        let socket_path = common::get_socket_path();
        if let Err(e) = ipc_server::start(&socket_path, ipc_state, ipc_engine, event_tx).await {
            log::error!("IPC server error: {:#}", e);
        }
    });

    // Set up signal handlers
    let signal_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            log::error!("Failed to set up signal handlers: {}", e);
            return;
        }
        signal_state.lock().await.should_exit = true;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = ipc_handle => {
            log::info!("IPC server stopped");
        }
        _ = ui_handle => {
            log::info!("UI context stopped");
        }
    }

    log::info!(
        "Daemon shutting down after {}s ({} controllers, {} views live)",
        state.lock().await.uptime_secs(),
        engine.controllers().len(),
        engine.views().len()
    );
    Ok(())
}

async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            log::info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            log::info!("Received SIGINT, shutting down...");
        }
    }
    Ok(())
}
