//! Per-user conversation handling.
//!
//! [`ConversationController`] decides what an inbound message means for its
//! sender: a command, the answer to a pending prompt, or a post to run
//! through the [`LinkPipeline`]. It returns the replies to send and any
//! operator [`NotifyEvent`]s; it never talks to the bus itself.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::bus::{InboundMessage, OutboundMessage};
use crate::error::RelayError;
use crate::health::{HealthRegistry, HealthStatus, RelayMetrics};
use crate::notify::{NotifyEvent, SettingsChange};
use crate::settings::{
    is_valid_api_key, RemoveOutcome, SettingsField, SettingsStore, SettingsUpdate, UserSettings,
};

use super::commands::Command;
use super::pipeline::{LinkPipeline, PipelineOutput};
use super::replies::{self, Replies};

/// Health check name for the settings store.
pub const SETTINGS_STORE_CHECK: &str = "settings_store";

/// Which input, if any, the bot is waiting for from a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingApiKey,
    AwaitingHeader,
    AwaitingFooter,
}

impl ConversationState {
    fn prompt(&self) -> Option<&'static str> {
        match self {
            ConversationState::Idle => None,
            ConversationState::AwaitingApiKey => Some(replies::ASK_API_KEY),
            ConversationState::AwaitingHeader => Some(replies::ASK_HEADER),
            ConversationState::AwaitingFooter => Some(replies::ASK_FOOTER),
        }
    }
}

/// Result of handling one inbound message.
#[derive(Debug, Default)]
pub struct Outcome {
    pub replies: Vec<OutboundMessage>,
    pub events: Vec<NotifyEvent>,
}

impl Outcome {
    fn reply(msg: &InboundMessage, text: &str) -> Self {
        Self {
            replies: vec![OutboundMessage::reply_to(msg, text)],
            events: Vec::new(),
        }
    }

    fn with_event(mut self, event: NotifyEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Routes each message to a command, a prompt answer, or the link pipeline.
pub struct ConversationController {
    store: Arc<Mutex<SettingsStore>>,
    states: Mutex<HashMap<String, ConversationState>>,
    pipeline: LinkPipeline,
    replies: Replies,
    metrics: Arc<RelayMetrics>,
    health: Option<HealthRegistry>,
}

impl ConversationController {
    pub fn new(
        store: Arc<Mutex<SettingsStore>>,
        pipeline: LinkPipeline,
        replies: Replies,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            store,
            states: Mutex::new(HashMap::new()),
            pipeline,
            replies,
            metrics,
            health: None,
        }
    }

    /// Report settings persistence problems on `registry`.
    pub fn with_health(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    pub fn store(&self) -> &Arc<Mutex<SettingsStore>> {
        &self.store
    }

    /// The user's current conversation state.
    pub async fn state(&self, user_id: &str) -> ConversationState {
        self.states
            .lock()
            .await
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Handle one inbound message.
    ///
    /// Commands always win and cancel a pending prompt. Otherwise a pending
    /// prompt consumes the message, and an idle user's message goes through
    /// the pipeline once they have an API key.
    pub async fn handle(&self, msg: &InboundMessage) -> Outcome {
        let user_id = msg.sender_id();

        if let Some(command) = msg.text.as_deref().and_then(Command::parse) {
            self.states.lock().await.remove(user_id);
            debug!(user = %user_id, command = command.as_str(), "Command received");
            return self.handle_command(command, msg).await;
        }

        let pending = self.states.lock().await.remove(user_id);
        match pending {
            Some(state) if state != ConversationState::Idle => {
                self.handle_answer(state, msg).await
            }
            _ => self.handle_post(msg).await,
        }
    }

    async fn set_state(&self, user_id: &str, state: ConversationState) {
        let mut states = self.states.lock().await;
        if state == ConversationState::Idle {
            states.remove(user_id);
        } else {
            states.insert(user_id.to_string(), state);
        }
    }

    async fn handle_command(&self, command: Command, msg: &InboundMessage) -> Outcome {
        let user_id = msg.sender_id();
        match command {
            Command::Start => {
                let settings = self.store.lock().await.settings(user_id);
                info!(user = %user_id, "User started the bot");
                Outcome::reply(msg, &self.replies.welcome(msg.sender.display_name()))
                    .with_event(NotifyEvent::user_started(&msg.sender, settings))
            }
            Command::Api => self.prompt(msg, ConversationState::AwaitingApiKey).await,
            Command::AddHeader => self.prompt(msg, ConversationState::AwaitingHeader).await,
            Command::AddFooter => self.prompt(msg, ConversationState::AwaitingFooter).await,
            Command::RemoveHeader => self.remove(msg, SettingsField::Header).await,
            Command::RemoveFooter => self.remove(msg, SettingsField::Footer).await,
            Command::EnableText => {
                let settings = self.update(user_id, SettingsUpdate::text_enabled(true)).await;
                Outcome::reply(msg, replies::TEXT_ENABLED).with_event(
                    NotifyEvent::settings_changed(&msg.sender, SettingsChange::TextEnabled, settings),
                )
            }
            Command::DisableText => {
                let settings = self.update(user_id, SettingsUpdate::text_enabled(false)).await;
                Outcome::reply(msg, replies::TEXT_DISABLED).with_event(
                    NotifyEvent::settings_changed(&msg.sender, SettingsChange::TextDisabled, settings),
                )
            }
            Command::Settings => {
                let settings = self.store.lock().await.settings(user_id);
                Outcome::reply(msg, &replies::settings_summary(&settings))
            }
        }
    }

    async fn prompt(&self, msg: &InboundMessage, state: ConversationState) -> Outcome {
        self.set_state(msg.sender_id(), state).await;
        Outcome::reply(msg, state.prompt().unwrap_or_default())
    }

    async fn remove(&self, msg: &InboundMessage, field: SettingsField) -> Outcome {
        let user_id = msg.sender_id();
        let (removed_text, missing_text, change) = match field {
            SettingsField::Header => (
                replies::HEADER_REMOVED,
                replies::NO_HEADER,
                SettingsChange::HeaderRemoved,
            ),
            SettingsField::Footer => (
                replies::FOOTER_REMOVED,
                replies::NO_FOOTER,
                SettingsChange::FooterRemoved,
            ),
        };

        let mut store = self.store.lock().await;
        let removed = match store.remove_field(user_id, field).await {
            Ok(RemoveOutcome::Removed) => {
                self.persisted();
                true
            }
            Ok(RemoveOutcome::NotSet) => false,
            Err(e) => {
                self.persist_failed(user_id, &e);
                true
            }
        };
        let settings = store.settings(user_id);
        drop(store);

        if removed {
            Outcome::reply(msg, removed_text)
                .with_event(NotifyEvent::settings_changed(&msg.sender, change, settings))
        } else {
            Outcome::reply(msg, missing_text)
        }
    }

    async fn handle_answer(&self, state: ConversationState, msg: &InboundMessage) -> Outcome {
        let user_id = msg.sender_id();
        let answer = msg
            .text
            .as_deref()
            .or(msg.caption.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if answer.is_empty() {
            self.set_state(user_id, state).await;
            return Outcome::reply(msg, state.prompt().unwrap_or_default());
        }

        let (update, reply, change) = match state {
            ConversationState::AwaitingApiKey => {
                if !is_valid_api_key(answer) {
                    debug!(user = %user_id, "Rejected malformed API key");
                    self.set_state(user_id, state).await;
                    return Outcome::reply(msg, replies::INVALID_API_KEY);
                }
                (
                    SettingsUpdate::api_key(answer),
                    replies::API_KEY_ADDED,
                    SettingsChange::ApiKeySet,
                )
            }
            ConversationState::AwaitingHeader => (
                SettingsUpdate::header(answer),
                replies::HEADER_ADDED,
                SettingsChange::HeaderSet,
            ),
            ConversationState::AwaitingFooter => (
                SettingsUpdate::footer(answer),
                replies::FOOTER_ADDED,
                SettingsChange::FooterSet,
            ),
            ConversationState::Idle => return self.handle_post(msg).await,
        };

        let settings = self.update(user_id, update).await;
        info!(user = %user_id, change = change.describe(), "Settings updated");
        Outcome::reply(msg, reply)
            .with_event(NotifyEvent::settings_changed(&msg.sender, change, settings))
    }

    async fn handle_post(&self, msg: &InboundMessage) -> Outcome {
        let (api_key, settings) = {
            let store = self.store.lock().await;
            let settings = store.settings(msg.sender_id());
            (settings.api_key.clone(), settings)
        };
        let Some(api_key) = api_key else {
            return Outcome::reply(msg, replies::MISSING_API_KEY);
        };

        let source = match (&msg.text, &msg.caption) {
            (Some(text), _) => Some(text.trim()),
            (None, Some(caption)) if msg.has_media() => Some(caption.trim()),
            _ => None,
        };
        let output = match source {
            Some(text) => self.pipeline.run(text, &api_key, &settings).await,
            None => PipelineOutput::NotALink,
        };

        match output {
            PipelineOutput::Composed(body) => {
                let reply = match &msg.media {
                    Some(media) if msg.text.is_none() => {
                        OutboundMessage::media_reply_to(msg, media.clone(), &body)
                    }
                    _ => OutboundMessage::reply_to(msg, &body),
                };
                Outcome {
                    replies: vec![reply],
                    events: Vec::new(),
                }
            }
            PipelineOutput::NotALink => {
                self.metrics.record_not_a_link();
                Outcome::reply(msg, replies::NOT_A_LINK)
            }
        }
    }

    /// Merge `update` and return the resulting settings.
    ///
    /// A failed write is logged; the in-memory change stands.
    async fn update(&self, user_id: &str, update: SettingsUpdate) -> UserSettings {
        let mut store = self.store.lock().await;
        match store.set(user_id, update).await {
            Ok(settings) => {
                self.persisted();
                settings
            }
            Err(e) => {
                self.persist_failed(user_id, &e);
                store.settings(user_id)
            }
        }
    }

    fn persisted(&self) {
        if let Some(health) = &self.health {
            health.update(SETTINGS_STORE_CHECK, HealthStatus::Ok, None);
        }
    }

    fn persist_failed(&self, user_id: &str, e: &RelayError) {
        error!(user = %user_id, error = %e, "Failed to persist settings; keeping in-memory state");
        if let Some(health) = &self.health {
            health.update(
                SETTINGS_STORE_CHECK,
                HealthStatus::Degraded,
                Some(e.to_string()),
            );
        }
    }
}
