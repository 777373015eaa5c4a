//! LinkRelay - Telegram bot that rewrites every link in a message into a
//! short link using each user's own shortening API key.

pub mod bus;
pub mod channels;
pub mod compose;
pub mod config;
pub mod error;
pub mod health;
pub mod links;
pub mod notify;
pub mod relay;
pub mod settings;
pub mod shortener;
pub mod utils;

pub use bus::{InboundMessage, MediaAttachment, MediaType, MessageBus, OutboundMessage};
pub use config::Config;
pub use error::{RelayError, Result, ShortenError};
pub use relay::{ConversationController, LinkPipeline, RelayLoop};
pub use settings::{SettingsStore, UserSettings};
pub use shortener::{HttpShortener, Shortener};
