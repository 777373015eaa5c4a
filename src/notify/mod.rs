//! Operator notifications.
//!
//! The conversation controller emits a [`NotifyEvent`] when a user runs
//! `/start` or changes a setting. The [`Notifier`] renders each event once
//! and publishes it to every configured operator chat over the message bus.
//! Delivery problems are logged and never reach the user.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::bus::{MessageBus, OutboundMessage, SenderProfile};
use crate::config::NotifyConfig;
use crate::settings::UserSettings;
use crate::utils::string::mask_secret;

/// Which setting a user changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    ApiKeySet,
    HeaderSet,
    HeaderRemoved,
    FooterSet,
    FooterRemoved,
    TextEnabled,
    TextDisabled,
}

impl SettingsChange {
    pub fn describe(&self) -> &'static str {
        match self {
            SettingsChange::ApiKeySet => "API key set",
            SettingsChange::HeaderSet => "header set",
            SettingsChange::HeaderRemoved => "header removed",
            SettingsChange::FooterSet => "footer set",
            SettingsChange::FooterRemoved => "footer removed",
            SettingsChange::TextEnabled => "text enabled",
            SettingsChange::TextDisabled => "text disabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    UserStarted,
    SettingsChanged(SettingsChange),
}

/// Something operators should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEvent {
    pub kind: NotifyKind,
    pub profile: SenderProfile,
    /// The user's settings after the change.
    pub settings: UserSettings,
    pub at: DateTime<Utc>,
}

impl NotifyEvent {
    pub fn user_started(profile: &SenderProfile, settings: UserSettings) -> Self {
        Self {
            kind: NotifyKind::UserStarted,
            profile: profile.clone(),
            settings,
            at: Utc::now(),
        }
    }

    pub fn settings_changed(
        profile: &SenderProfile,
        change: SettingsChange,
        settings: UserSettings,
    ) -> Self {
        Self {
            kind: NotifyKind::SettingsChanged(change),
            profile: profile.clone(),
            settings,
            at: Utc::now(),
        }
    }

    /// Plain-text rendering sent to operator chats.
    pub fn render(&self) -> String {
        let title = match self.kind {
            NotifyKind::UserStarted => "New user started the bot".to_string(),
            NotifyKind::SettingsChanged(change) => format!("Settings changed: {}", change.describe()),
        };
        let optional = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let username = self
            .profile
            .username
            .as_deref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{title}\n\
             User ID: {id}\n\
             First name: {first}\n\
             Last name: {last}\n\
             Username: {username}\n\
             API key: {key}\n\
             Header: {header}\n\
             Footer: {footer}\n\
             Text: {text}\n\
             At: {at}",
            title = title,
            id = self.profile.id,
            first = optional(&self.profile.first_name),
            last = optional(&self.profile.last_name),
            username = username,
            key = self
                .settings
                .api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "-".to_string()),
            header = optional(&self.settings.header),
            footer = optional(&self.settings.footer),
            text = if self.settings.text_enabled {
                "enabled"
            } else {
                "disabled"
            },
            at = self.at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

/// Publishes rendered events to operator chats.
pub struct Notifier {
    bus: Arc<MessageBus>,
    channel: String,
    chat_ids: Vec<String>,
}

impl Notifier {
    pub fn new(bus: Arc<MessageBus>, channel: &str, chat_ids: Vec<String>) -> Self {
        Self {
            bus,
            channel: channel.to_string(),
            chat_ids,
        }
    }

    /// Notifier sending through the Telegram channel to the configured chats.
    pub fn from_config(bus: Arc<MessageBus>, config: &NotifyConfig) -> Self {
        Self::new(bus, "telegram", config.chat_ids.clone())
    }

    pub fn is_enabled(&self) -> bool {
        !self.chat_ids.is_empty()
    }

    /// Publish `event` to every operator chat. Returns how many were queued.
    pub async fn notify(&self, event: &NotifyEvent) -> usize {
        if !self.is_enabled() {
            return 0;
        }

        let text = event.render();
        let mut sent = 0;
        for chat_id in &self.chat_ids {
            let msg = OutboundMessage::new(&self.channel, chat_id, &text);
            match self.bus.publish_outbound(msg).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(chat_id = %chat_id, error = %e, "Failed to queue operator notice"),
            }
        }
        debug!(user = %event.profile.id, sent = sent, "Operator notice queued");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SenderProfile {
        SenderProfile::new("42")
            .with_first_name("Ada")
            .with_username("ada")
    }

    #[test]
    fn test_render_masks_key() {
        let settings = UserSettings {
            api_key: Some("0123456789abcdef0123456789abcdef01234567".into()),
            ..Default::default()
        };
        let event = NotifyEvent::settings_changed(&profile(), SettingsChange::ApiKeySet, settings);
        let text = event.render();

        assert!(text.starts_with("Settings changed: API key set\n"));
        assert!(text.contains("User ID: 42"));
        assert!(text.contains("Username: @ada"));
        assert!(text.contains("Last name: -"));
        assert!(text.contains("API key: 0123****"));
        assert!(!text.contains("0123456789abcdef"));
        assert!(text.contains("Text: enabled"));
    }

    #[tokio::test]
    async fn test_notify_every_chat() {
        let bus = Arc::new(MessageBus::new());
        let notifier = Notifier::new(
            Arc::clone(&bus),
            "telegram",
            vec!["-1001".into(), "-1002".into()],
        );
        let event = NotifyEvent::user_started(&profile(), UserSettings::default());

        assert_eq!(notifier.notify(&event).await, 2);
        let first = bus.consume_outbound().await.unwrap();
        let second = bus.consume_outbound().await.unwrap();
        assert_eq!(first.chat_id, "-1001");
        assert_eq!(second.chat_id, "-1002");
        assert!(first.content.starts_with("New user started the bot"));
        assert_eq!(first.content, second.content);
    }

    #[tokio::test]
    async fn test_disabled_notifier_sends_nothing() {
        let bus = Arc::new(MessageBus::new());
        let notifier = Notifier::from_config(Arc::clone(&bus), &NotifyConfig::default());
        assert!(!notifier.is_enabled());
        let event = NotifyEvent::user_started(&profile(), UserSettings::default());
        assert_eq!(notifier.notify(&event).await, 0);
        assert!(bus.try_publish_outbound(OutboundMessage::new("t", "c", "x")).is_ok());
        assert_eq!(bus.consume_outbound().await.unwrap().content, "x");
    }
}
