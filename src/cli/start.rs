//! Start command handler (runs the bot).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use linkrelay::bus::MessageBus;
use linkrelay::channels::telegram::TELEGRAM_CHANNEL;
use linkrelay::channels::{ChannelManager, TelegramChannel};
use linkrelay::config::Config;
use linkrelay::health::{
    start_health_server, start_periodic_metrics_flush, HealthCheck, HealthRegistry, HealthStatus,
    RelayMetrics,
};
use linkrelay::notify::Notifier;
use linkrelay::relay::{
    ConversationController, LinkPipeline, RelayLoop, Replies, SETTINGS_STORE_CHECK,
};
use linkrelay::settings::SettingsStore;
use linkrelay::shortener::HttpShortener;

/// Run the bot until Ctrl-C.
pub(crate) async fn cmd_start(config: Config) -> Result<()> {
    println!("Starting LinkRelay...");

    config
        .ensure_valid()
        .with_context(|| "Invalid configuration (run `linkrelay config check`)")?;

    // Create message bus
    let bus = Arc::new(MessageBus::new());
    let metrics = Arc::new(RelayMetrics::new());

    let health = HealthRegistry::new();
    health.register(HealthCheck::new(TELEGRAM_CHANNEL, HealthStatus::Degraded));
    health.register(HealthCheck::new(SETTINGS_STORE_CHECK, HealthStatus::Ok));

    // Settings survive a corrupt file: start empty and say so.
    let store = Arc::new(Mutex::new(SettingsStore::open_or_empty(config.store_path())));

    let shortener = HttpShortener::from_config(&config.shortener)
        .with_context(|| "Failed to build shortener client")?;
    info!(endpoint = %shortener.endpoint(), "Shortening endpoint configured");

    let pipeline = LinkPipeline::new(
        Arc::new(shortener),
        &config.shortener.failure_message,
        Arc::clone(&metrics),
    );
    let controller = Arc::new(
        ConversationController::new(
            store,
            pipeline,
            Replies::from_config(&config.shortener),
            Arc::clone(&metrics),
        )
        .with_health(health.clone()),
    );

    let notifier = Arc::new(Notifier::from_config(Arc::clone(&bus), &config.notify));
    if !notifier.is_enabled() {
        info!("No operator chats configured; notifications disabled");
    }

    // Start health check server (liveness + readiness)
    let health_handle = if config.health.enabled {
        match start_health_server(&config.health.host, config.health.port, health.clone()).await {
            Ok(handle) => {
                info!(
                    port = config.health.port,
                    "Health endpoints available at /health and /ready"
                );
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to start health server (non-fatal)");
                None
            }
        }
    } else {
        None
    };

    let (metrics_shutdown_tx, metrics_shutdown_rx) = tokio::sync::watch::channel(false);
    let metrics_flush_handle = start_periodic_metrics_flush(Arc::clone(&metrics), metrics_shutdown_rx);

    // Register and start channels
    let channel_manager = ChannelManager::new(Arc::clone(&bus));
    let telegram =
        TelegramChannel::new(config.telegram.clone(), Arc::clone(&bus)).with_health(health.clone());
    if telegram.is_enabled() {
        channel_manager.register(Box::new(telegram)).await;
    } else {
        warn!("Telegram channel disabled; the bot will not receive messages");
    }
    channel_manager
        .start_all()
        .await
        .with_context(|| "Failed to start channels")?;

    let relay = Arc::new(RelayLoop::new(
        Arc::clone(&bus),
        controller,
        notifier,
        Arc::clone(&metrics),
    ));
    let relay_handle = tokio::spawn({
        let relay = Arc::clone(&relay);
        async move {
            if let Err(e) = relay.start().await {
                error!("Relay loop error: {}", e);
            }
        }
    });

    println!("LinkRelay running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "Failed to listen for shutdown signal")?;

    println!();
    println!("Shutting down...");

    relay.stop();
    if let Err(e) = channel_manager.stop_all().await {
        warn!("Error stopping channels: {}", e);
    }
    if relay_handle.await.is_err() {
        warn!("Relay loop task ended abnormally");
    }

    let _ = metrics_shutdown_tx.send(true);
    if metrics_flush_handle.await.is_err() {
        warn!("Metrics flush task ended abnormally");
    }
    if let Some(handle) = health_handle {
        handle.abort();
    }

    println!("LinkRelay stopped.");
    Ok(())
}
