//! Message types for the LinkRelay message bus
//!
//! This module defines the core message types used for communication
//! between channels, the relay loop, and the message bus.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Public profile of the user who sent a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SenderProfile {
    /// Platform user id
    pub id: String,
    /// First name, if the platform exposes one
    pub first_name: Option<String>,
    /// Last name, if set
    pub last_name: Option<String>,
    /// Public username without the leading `@`
    pub username: Option<String>,
}

impl SenderProfile {
    /// Creates a profile carrying only the user id.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Sets the first name (builder pattern).
    pub fn with_first_name(mut self, first_name: &str) -> Self {
        self.first_name = Some(first_name.to_string());
        self
    }

    /// Sets the username (builder pattern).
    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Name to greet the user with: first name, else username, else "User".
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.username.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("User")
    }
}

/// Represents an incoming message from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The channel this message came from (e.g., "telegram")
    pub channel: String,
    /// The user who sent the message
    pub sender: SenderProfile,
    /// Unique identifier of the chat/conversation
    pub chat_id: String,
    /// Message body, when the message is plain text
    pub text: Option<String>,
    /// Caption attached to a media message
    pub caption: Option<String>,
    /// Media carried by the message, if any
    pub media: Option<MediaAttachment>,
    /// Additional metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// Represents an outgoing message to be sent via a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The channel to send this message through
    pub channel: String,
    /// The chat/conversation to send to
    pub chat_id: String,
    /// Text to send; used as the caption when `media` is set
    pub content: String,
    /// Media to re-send alongside the content
    pub media: Option<MediaAttachment>,
}

/// Media already hosted by the platform, referenced by its file id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaAttachment {
    /// The type of media
    pub media_type: MediaType,
    /// Platform file id; re-sending by id needs no upload
    pub file_id: String,
}

/// Types of media that can carry a caption.
///
/// Declaration order is the selection priority when a message somehow
/// carries more than one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
}

impl MediaType {
    /// All media types, highest priority first.
    pub const PRIORITY: [MediaType; 5] = [
        MediaType::Photo,
        MediaType::Video,
        MediaType::Document,
        MediaType::Audio,
        MediaType::Voice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
            MediaType::Document => "document",
            MediaType::Audio => "audio",
            MediaType::Voice => "voice",
        }
    }
}

impl MediaAttachment {
    /// Creates a new media attachment referencing a platform file id.
    pub fn new(media_type: MediaType, file_id: &str) -> Self {
        Self {
            media_type,
            file_id: file_id.to_string(),
        }
    }
}

impl InboundMessage {
    /// Creates a new inbound text message.
    ///
    /// # Example
    /// ```
    /// use linkrelay::bus::message::InboundMessage;
    ///
    /// let msg = InboundMessage::new("telegram", "user123", "chat456", "https://example.com");
    /// assert_eq!(msg.text.as_deref(), Some("https://example.com"));
    /// assert!(msg.caption.is_none());
    /// ```
    pub fn new(channel: &str, sender_id: &str, chat_id: &str, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender: SenderProfile::new(sender_id),
            chat_id: chat_id.to_string(),
            text: Some(text.to_string()),
            caption: None,
            media: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a new inbound media message with an optional caption.
    ///
    /// # Example
    /// ```
    /// use linkrelay::bus::message::{InboundMessage, MediaAttachment, MediaType};
    ///
    /// let media = MediaAttachment::new(MediaType::Photo, "AgACAgIAAxk");
    /// let msg = InboundMessage::media("telegram", "user123", "chat456", media, Some("see https://a.io"));
    /// assert!(msg.text.is_none());
    /// assert!(msg.has_media());
    /// ```
    pub fn media(
        channel: &str,
        sender_id: &str,
        chat_id: &str,
        media: MediaAttachment,
        caption: Option<&str>,
    ) -> Self {
        Self {
            channel: channel.to_string(),
            sender: SenderProfile::new(sender_id),
            chat_id: chat_id.to_string(),
            text: None,
            caption: caption.map(str::to_string),
            media: Some(media),
            metadata: HashMap::new(),
        }
    }

    /// Replaces the sender profile (builder pattern).
    pub fn with_sender(mut self, sender: SenderProfile) -> Self {
        self.sender = sender;
        self
    }

    /// Adds a metadata key-value pair to the message (builder pattern).
    ///
    /// # Example
    /// ```
    /// use linkrelay::bus::message::InboundMessage;
    ///
    /// let msg = InboundMessage::new("telegram", "user123", "chat456", "Hello")
    ///     .with_metadata("message_id", "12345");
    /// assert_eq!(msg.metadata.get("message_id"), Some(&"12345".to_string()));
    /// ```
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Id of the sending user.
    pub fn sender_id(&self) -> &str {
        &self.sender.id
    }

    /// Checks if this message has any media attached.
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

impl OutboundMessage {
    /// Creates a new outbound text message.
    ///
    /// # Example
    /// ```
    /// use linkrelay::bus::message::OutboundMessage;
    ///
    /// let msg = OutboundMessage::new("telegram", "chat456", "Hello from the bot!");
    /// assert_eq!(msg.channel, "telegram");
    /// assert!(msg.media.is_none());
    /// ```
    pub fn new(channel: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            media: None,
        }
    }

    /// Creates a text reply routed back to the chat the inbound message came from.
    pub fn reply_to(msg: &InboundMessage, content: &str) -> Self {
        Self::new(&msg.channel, &msg.chat_id, content)
    }

    /// Creates a media reply with `caption`, routed back to the inbound chat.
    pub fn media_reply_to(msg: &InboundMessage, media: MediaAttachment, caption: &str) -> Self {
        Self {
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
            content: caption.to_string(),
            media: Some(media),
        }
    }
}
