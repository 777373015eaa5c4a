//! Channel manager: lifecycle for registered channels and the outbound
//! dispatcher that routes bus messages to them by name.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bus::{MessageBus, OutboundMessage};
use crate::error::Result;

use super::Channel;

/// Owns every channel and delivers outbound messages.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use linkrelay::bus::MessageBus;
/// use linkrelay::channels::ChannelManager;
///
/// # tokio_test::block_on(async {
/// let manager = ChannelManager::new(Arc::new(MessageBus::new()));
/// assert!(manager.channels().await.is_empty());
/// # })
/// ```
pub struct ChannelManager {
    channels: Arc<RwLock<HashMap<String, Box<dyn Channel>>>>,
    bus: Arc<MessageBus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    dispatcher_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            bus,
            shutdown_tx,
            shutdown_rx,
            dispatcher_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a channel under its name, replacing any previous one.
    pub async fn register(&self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        info!("Registering channel: {}", name);
        self.channels.write().await.insert(name, channel);
    }

    pub async fn channels(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    pub async fn has_channel(&self, name: &str) -> bool {
        self.channels.read().await.contains_key(name)
    }

    /// Names of channels that report themselves running.
    pub async fn running_channels(&self) -> Vec<String> {
        self.channels
            .read()
            .await
            .iter()
            .filter(|(_, c)| c.is_running())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Start every channel, then spawn the outbound dispatcher.
    ///
    /// A channel that fails to start is logged and skipped.
    pub async fn start_all(&self) -> Result<()> {
        {
            let dispatcher_handle = self.dispatcher_handle.read().await;
            if let Some(ref handle) = *dispatcher_handle {
                if !handle.is_finished() {
                    warn!("Dispatcher already running, skipping start");
                    return Ok(());
                }
            }
        }

        let mut channels = self.channels.write().await;
        for (name, channel) in channels.iter_mut() {
            info!("Starting channel: {}", name);
            if let Err(e) = channel.start().await {
                error!("Failed to start channel {}: {}", name, e);
            }
        }
        drop(channels);

        let _ = self.shutdown_tx.send(false);

        let bus = Arc::clone(&self.bus);
        let channels_ref = Arc::clone(&self.channels);
        let shutdown_rx = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            dispatch_outbound(bus, channels_ref, shutdown_rx).await;
        });
        *self.dispatcher_handle.write().await = Some(handle);

        Ok(())
    }

    /// Stop the dispatcher (waiting up to 5s), then every channel.
    pub async fn stop_all(&self) -> Result<()> {
        info!("Signaling dispatcher to stop");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.dispatcher_handle.write().await.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
                Ok(_) => info!("Dispatcher stopped cleanly"),
                Err(_) => warn!("Dispatcher did not stop within timeout"),
            }
        }

        let mut channels = self.channels.write().await;
        for (name, channel) in channels.iter_mut() {
            info!("Stopping channel: {}", name);
            if let Err(e) = channel.stop().await {
                error!("Failed to stop channel {}: {}", name, e);
            }
        }
        Ok(())
    }

    /// Send directly through a named channel. Unknown channels are logged.
    pub async fn send(&self, channel_name: &str, msg: OutboundMessage) -> Result<()> {
        let channels = self.channels.read().await;
        match channels.get(channel_name) {
            Some(channel) => channel.send(msg).await,
            None => {
                warn!("Channel not found: {}", channel_name);
                Ok(())
            }
        }
    }

    pub fn bus(&self) -> Arc<MessageBus> {
        Arc::clone(&self.bus)
    }
}

async fn dispatch_outbound(
    bus: Arc<MessageBus>,
    channels: Arc<RwLock<HashMap<String, Box<dyn Channel>>>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Outbound dispatcher started");
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Outbound dispatcher received shutdown signal");
                    break;
                }
            }
            msg = bus.consume_outbound() => {
                let Some(msg) = msg else {
                    info!("Outbound channel closed");
                    break;
                };
                let channel_name = msg.channel.clone();
                let chat_id = msg.chat_id.clone();
                let channels = channels.read().await;
                match channels.get(&channel_name) {
                    Some(channel) => {
                        if let Err(e) = channel.send(msg).await {
                            error!(channel = %channel_name, chat_id = %chat_id, error = %e, "Failed to send message");
                        }
                    }
                    None => warn!("Unknown channel for outbound message: {}", channel_name),
                }
            }
        }
    }
    info!("Outbound dispatcher stopped");
}
