//! Telegram channel built on teloxide.
//!
//! ```text
//! ┌──────────────────┐         ┌──────────────────┐
//! │   Telegram API   │ <────── │  TelegramChannel │
//! │                  │ ──────> │   (teloxide)     │
//! └──────────────────┘         └────────┬─────────┘
//!                                       │ InboundMessage
//!                                       ▼
//!                              ┌──────────────────┐
//!                              │    MessageBus    │
//!                              └──────────────────┘
//! ```
//!
//! Every message from an allowed user is published, whatever it carries:
//! text, a captioned photo/video/document/audio/voice, or nothing the relay
//! understands. Outbound media is re-sent by file id, so nothing is uploaded.

use async_trait::async_trait;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{FileId, InputFile, Message};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::{InboundMessage, MediaAttachment, MediaType, MessageBus, OutboundMessage, SenderProfile};
use crate::config::TelegramConfig;
use crate::error::{RelayError, Result};
use crate::health::{HealthRegistry, HealthStatus};
use crate::utils::string::preview;

use super::{BaseChannelConfig, Channel};

/// Channel name used for routing and the health check.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Maximum number of startup connectivity retries before giving up.
const MAX_STARTUP_RETRIES: u32 = 10;
/// Base delay (in seconds) for exponential backoff on startup retries.
const BASE_RETRY_DELAY_SECS: u64 = 2;
/// Maximum delay (in seconds) for exponential backoff on startup retries.
const MAX_RETRY_DELAY_SECS: u64 = 120;

/// Telegram Bot API channel.
pub struct TelegramChannel {
    config: TelegramConfig,
    base_config: BaseChannelConfig,
    bus: Arc<MessageBus>,
    /// Shared with the polling task so either side can clear it.
    running: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Cached bot used by `send`
    bot: Option<teloxide::Bot>,
    health: Option<HealthRegistry>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig, bus: Arc<MessageBus>) -> Self {
        let base_config = BaseChannelConfig::with_allowlist(TELEGRAM_CHANNEL, config.allow_from.clone())
            .deny_by_default(config.deny_by_default);
        Self {
            config,
            base_config,
            bus,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            bot: None,
            health: None,
        }
    }

    /// Report connectivity on the `telegram` check of `registry`.
    pub fn with_health(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Exponential backoff delay for a startup retry attempt.
    fn startup_backoff_delay(attempt: u32) -> Duration {
        let delay_secs = BASE_RETRY_DELAY_SECS
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY_SECS);
        Duration::from_secs(delay_secs)
    }

    /// Build a bot client with system proxy detection disabled.
    fn build_bot(token: &str) -> Result<teloxide::Bot> {
        let client = teloxide::net::default_reqwest_settings()
            .no_proxy()
            .build()
            .map_err(|e| {
                RelayError::Channel(format!("Failed to build Telegram HTTP client: {}", e))
            })?;
        Ok(teloxide::Bot::with_client(token.to_string(), client))
    }

    fn report(health: &Option<HealthRegistry>, status: HealthStatus, message: Option<String>) {
        if let Some(health) = health {
            health.update(TELEGRAM_CHANNEL, status, message);
        }
    }
}

/// Pick the attachment to re-send: the first present of photo (largest
/// size), video, document, audio, voice.
pub(crate) fn media_attachment(msg: &Message) -> Option<MediaAttachment> {
    MediaType::PRIORITY.iter().find_map(|kind| {
        let file_id = match kind {
            MediaType::Photo => msg.photo().and_then(|sizes| sizes.last()).map(|p| &p.file.id),
            MediaType::Video => msg.video().map(|v| &v.file.id),
            MediaType::Document => msg.document().map(|d| &d.file.id),
            MediaType::Audio => msg.audio().map(|a| &a.file.id),
            MediaType::Voice => msg.voice().map(|v| &v.file.id),
        }?;
        Some(MediaAttachment::new(*kind, &file_id.0))
    })
}

/// Convert a Telegram message into an [`InboundMessage`].
///
/// Returns `None` for messages without a sender (channel posts).
pub(crate) fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from.as_ref()?;
    let user_id = user.id.0.to_string();
    let chat_id = msg.chat.id.0.to_string();

    let sender = SenderProfile {
        id: user_id.clone(),
        first_name: Some(user.first_name.clone()).filter(|n| !n.is_empty()),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    };

    let inbound = match media_attachment(msg) {
        Some(media) => {
            InboundMessage::media(TELEGRAM_CHANNEL, &user_id, &chat_id, media, msg.caption())
        }
        None => {
            let mut inbound =
                InboundMessage::new(TELEGRAM_CHANNEL, &user_id, &chat_id, msg.text().unwrap_or_default());
            inbound.text = msg.text().map(str::to_string);
            inbound.caption = msg.caption().map(str::to_string);
            inbound
        }
    };

    Some(
        inbound
            .with_sender(sender)
            .with_metadata("message_id", &msg.id.0.to_string()),
    )
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        TELEGRAM_CHANNEL
    }

    /// Start long polling in a background task and return immediately.
    ///
    /// The task first checks the token with `get_me`, retrying transient
    /// failures with capped exponential backoff.
    async fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Telegram channel already running");
            return Ok(());
        }

        if !self.config.enabled {
            warn!("Telegram channel is disabled in configuration");
            self.running.store(false, Ordering::SeqCst);
            return Ok(());
        }

        if self.config.token.is_empty() {
            error!("Telegram bot token is empty");
            self.running.store(false, Ordering::SeqCst);
            return Err(RelayError::Config("Telegram bot token is empty".into()));
        }

        info!("Starting Telegram channel");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let bus = Arc::clone(&self.bus);
        let access = self.base_config.clone();
        let running_clone = Arc::clone(&self.running);
        let health = self.health.clone();

        let bot = match Self::build_bot(&self.config.token) {
            Ok(bot) => bot,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.bot = Some(bot.clone());

        tokio::spawn(async move {
            use teloxide::prelude::*;

            let task_health = health.clone();
            let task_result = std::panic::AssertUnwindSafe(async move {
                // Transient errors (DNS not ready, network still coming up)
                // are retried; an invalid token fails on the first attempt.
                let mut attempt: u32 = 0;
                loop {
                    match bot.get_me().await {
                        Ok(me) => {
                            info!(username = %me.username(), "Telegram bot authenticated");
                            TelegramChannel::report(&health, HealthStatus::Ok, None);
                            break;
                        }
                        Err(e) => {
                            use teloxide::RequestError;

                            let is_transient = matches!(
                                &e,
                                RequestError::Network(_)
                                    | RequestError::Io(_)
                                    | RequestError::RetryAfter(_)
                            );

                            if !is_transient || attempt >= MAX_STARTUP_RETRIES {
                                error!(
                                    "Telegram startup check failed after {} attempt(s): {}",
                                    attempt + 1,
                                    e
                                );
                                TelegramChannel::report(
                                    &health,
                                    HealthStatus::Down,
                                    Some(e.to_string()),
                                );
                                return;
                            }

                            let delay = if let RequestError::RetryAfter(d) = &e {
                                d.duration()
                            } else {
                                TelegramChannel::startup_backoff_delay(attempt)
                            };
                            warn!(
                                "Telegram startup check failed (attempt {}/{}), retrying in {}s: {}",
                                attempt + 1,
                                MAX_STARTUP_RETRIES,
                                delay.as_secs(),
                                e
                            );
                            tokio::select! {
                                _ = shutdown_rx.recv() => {
                                    info!("Telegram channel shutdown during startup retry");
                                    return;
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                            attempt += 1;
                        }
                    }
                }

                let handler = Update::filter_message().endpoint(
                    |msg: Message, bus: Arc<MessageBus>, access: BaseChannelConfig| async move {
                        let Some(inbound) = to_inbound(&msg) else {
                            debug!("Telegram: ignoring message without sender");
                            return Ok(());
                        };

                        if !access.is_allowed(inbound.sender_id()) {
                            info!(
                                "Telegram: User {} not in allowlist, ignoring message",
                                inbound.sender_id()
                            );
                            return Ok(());
                        }

                        info!(
                            user = %inbound.sender_id(),
                            chat_id = %inbound.chat_id,
                            media = inbound.media.as_ref().map(|m| m.media_type.as_str()).unwrap_or("none"),
                            "Telegram: Received message: {}",
                            preview(
                                inbound
                                    .text
                                    .as_deref()
                                    .or(inbound.caption.as_deref())
                                    .unwrap_or_default(),
                                50
                            )
                        );

                        if let Err(e) = bus.publish_inbound(inbound).await {
                            error!("Failed to publish inbound message to bus: {}", e);
                        }

                        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                    },
                );

                let mut dispatcher = Dispatcher::builder(bot, handler)
                    .dependencies(dptree::deps![bus, access])
                    .build();

                info!("Telegram bot dispatcher started, waiting for messages...");

                tokio::select! {
                    _ = dispatcher.dispatch() => {
                        info!("Telegram dispatcher completed");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Telegram channel shutdown signal received");
                    }
                }
            })
            .catch_unwind()
            .await;

            if task_result.is_err() {
                error!("Telegram polling task panicked");
                TelegramChannel::report(
                    &task_health,
                    HealthStatus::Down,
                    Some("polling task panicked".into()),
                );
            }

            running_clone.store(false, Ordering::SeqCst);
            info!("Telegram polling task stopped");
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            info!("Telegram channel already stopped");
            return Ok(());
        }

        info!("Stopping Telegram channel");
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).await.is_err() {
                warn!("Telegram shutdown channel already closed");
            }
        }
        self.bot = None;

        info!("Telegram channel stopped");
        Ok(())
    }

    /// Send text, or re-send media by file id with `content` as its caption.
    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        use teloxide::prelude::*;
        use teloxide::types::ChatId;

        if !self.running.load(Ordering::SeqCst) {
            warn!("Telegram channel not running, cannot send message");
            return Err(RelayError::Channel(
                "Telegram channel not running".to_string(),
            ));
        }

        let chat_id: i64 = msg.chat_id.parse().map_err(|_| {
            RelayError::Channel(format!("Invalid Telegram chat ID: {}", msg.chat_id))
        })?;
        let chat = ChatId(chat_id);

        let bot = self
            .bot
            .as_ref()
            .ok_or_else(|| RelayError::Channel("Telegram bot not initialized".to_string()))?;

        let result = match &msg.media {
            None => bot.send_message(chat, &msg.content).await.map(drop),
            Some(media) => {
                let file = InputFile::file_id(FileId(media.file_id.clone()));
                let caption = msg.content.clone();
                match media.media_type {
                    MediaType::Photo => bot.send_photo(chat, file).caption(caption).await.map(drop),
                    MediaType::Video => bot.send_video(chat, file).caption(caption).await.map(drop),
                    MediaType::Document => {
                        bot.send_document(chat, file).caption(caption).await.map(drop)
                    }
                    MediaType::Audio => bot.send_audio(chat, file).caption(caption).await.map(drop),
                    MediaType::Voice => bot.send_voice(chat, file).caption(caption).await.map(drop),
                }
            }
        };
        result.map_err(|e| RelayError::Channel(format!("Failed to send Telegram message: {}", e)))?;

        debug!(
            chat_id = chat_id,
            media = msg.media.as_ref().map(|m| m.media_type.as_str()).unwrap_or("none"),
            "Telegram: Message sent"
        );
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_allowed(&self, user_id: &str) -> bool {
        self.base_config.is_allowed(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(token: &str, allow_from: Vec<&str>) -> TelegramConfig {
        TelegramConfig {
            enabled: true,
            token: token.to_string(),
            allow_from: allow_from.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    /// Build a private-chat message from Bot API JSON, merging `extra` in.
    fn message(extra: serde_json::Value) -> Message {
        let mut json = json!({
            "message_id": 7,
            "date": 1700000000i64,
            "chat": { "id": 555i64, "type": "private", "first_name": "Ada" },
            "from": {
                "id": 42u64,
                "is_bot": false,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "username": "ada",
            },
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(json).expect("mock message")
    }

    fn photo_size(id: &str, width: u32) -> serde_json::Value {
        json!({
            "file_id": id,
            "file_unique_id": format!("u-{}", id),
            "width": width,
            "height": width,
            "file_size": 100,
        })
    }

    #[test]
    fn test_channel_creation_and_allowlist() {
        let channel = TelegramChannel::new(config("t", vec!["1"]), Arc::new(MessageBus::new()));
        assert_eq!(channel.name(), "telegram");
        assert!(!channel.is_running());
        assert!(channel.is_enabled());
        assert!(channel.is_allowed("1"));
        assert!(!channel.is_allowed("2"));
    }

    #[test]
    fn test_deny_by_default_from_config() {
        let mut cfg = config("t", vec![]);
        cfg.deny_by_default = true;
        let channel = TelegramChannel::new(cfg, Arc::new(MessageBus::new()));
        assert!(!channel.is_allowed("1"));
    }

    #[test]
    fn test_text_message_conversion() {
        let inbound = to_inbound(&message(json!({ "text": "see https://a.io" }))).unwrap();
        assert_eq!(inbound.channel, "telegram");
        assert_eq!(inbound.sender_id(), "42");
        assert_eq!(inbound.chat_id, "555");
        assert_eq!(inbound.text.as_deref(), Some("see https://a.io"));
        assert!(inbound.caption.is_none());
        assert!(inbound.media.is_none());
        assert_eq!(inbound.sender.first_name.as_deref(), Some("Ada"));
        assert_eq!(inbound.sender.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(inbound.sender.username.as_deref(), Some("ada"));
        assert_eq!(inbound.metadata.get("message_id").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let msg = message(json!({
            "photo": [photo_size("small", 90), photo_size("large", 1280)],
            "caption": "https://a.io",
        }));
        let inbound = to_inbound(&msg).unwrap();
        assert!(inbound.text.is_none());
        assert_eq!(inbound.caption.as_deref(), Some("https://a.io"));
        assert_eq!(
            inbound.media,
            Some(MediaAttachment::new(MediaType::Photo, "large"))
        );
    }

    #[test]
    fn test_document_and_voice_conversion() {
        let doc = message(json!({
            "document": { "file_id": "doc-1", "file_unique_id": "ud", "file_name": "a.pdf" },
            "caption": "x",
        }));
        assert_eq!(
            media_attachment(&doc),
            Some(MediaAttachment::new(MediaType::Document, "doc-1"))
        );

        let voice = message(json!({
            "voice": {
                "file_id": "v-1",
                "file_unique_id": "uv",
                "duration": 3,
                "mime_type": "audio/ogg",
            },
        }));
        let inbound = to_inbound(&voice).unwrap();
        assert_eq!(
            inbound.media,
            Some(MediaAttachment::new(MediaType::Voice, "v-1"))
        );
        assert!(inbound.caption.is_none());
    }

    #[test]
    fn test_unsupported_message_has_no_content() {
        let msg = message(json!({
            "location": { "latitude": 1.0, "longitude": 2.0 },
        }));
        let inbound = to_inbound(&msg).unwrap();
        assert!(inbound.text.is_none());
        assert!(inbound.caption.is_none());
        assert!(inbound.media.is_none());
    }

    #[test]
    fn test_message_without_sender_is_skipped() {
        let json = json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": { "id": -100123i64, "type": "channel", "title": "News" },
            "text": "https://a.io",
        });
        let msg: Message = serde_json::from_value(json).expect("mock channel post");
        assert!(to_inbound(&msg).is_none());
    }

    #[tokio::test]
    async fn test_start_without_token_fails() {
        let mut channel = TelegramChannel::new(config("", vec![]), Arc::new(MessageBus::new()));
        assert!(channel.start().await.is_err());
        assert!(!channel.is_running());
    }

    #[tokio::test]
    async fn test_start_disabled_is_noop() {
        let mut cfg = config("t", vec![]);
        cfg.enabled = false;
        let mut channel = TelegramChannel::new(cfg, Arc::new(MessageBus::new()));
        assert!(channel.start().await.is_ok());
        assert!(!channel.is_running());
        assert!(channel.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_send_not_running() {
        let channel = TelegramChannel::new(config("t", vec![]), Arc::new(MessageBus::new()));
        let result = channel
            .send(OutboundMessage::new("telegram", "12345", "Hello"))
            .await;
        assert!(matches!(result, Err(RelayError::Channel(_))));
    }

    #[test]
    fn test_startup_backoff_delay() {
        assert_eq!(TelegramChannel::startup_backoff_delay(0), Duration::from_secs(2));
        assert_eq!(TelegramChannel::startup_backoff_delay(1), Duration::from_secs(4));
        assert_eq!(TelegramChannel::startup_backoff_delay(2), Duration::from_secs(8));
        assert_eq!(
            TelegramChannel::startup_backoff_delay(20),
            Duration::from_secs(MAX_RETRY_DELAY_SECS)
        );
        assert_eq!(
            TelegramChannel::startup_backoff_delay(u32::MAX),
            Duration::from_secs(MAX_RETRY_DELAY_SECS)
        );
    }
}
