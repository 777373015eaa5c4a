//! Channels module - chat transports feeding the message bus.
//!
//! A channel turns platform updates into [`InboundMessage`](crate::bus::InboundMessage)s
//! and delivers [`OutboundMessage`](crate::bus::OutboundMessage)s back to the
//! platform. LinkRelay ships one channel, Telegram.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ChannelManager                │
//! │                                              │
//! │   ┌──────────────────┐                       │
//! │   │ TelegramChannel  │  implements Channel   │
//! │   └────────┬─────────┘                       │
//! │            │                                 │
//! │      ┌─────┴─────┐                           │
//! │      │MessageBus │  outbound messages are    │
//! │      │ (inbound/ │  routed back by channel   │
//! │      │ outbound) │  name                     │
//! │      └───────────┘                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use linkrelay::bus::MessageBus;
//! use linkrelay::channels::{ChannelManager, TelegramChannel};
//! use linkrelay::config::TelegramConfig;
//!
//! # tokio_test::block_on(async {
//! let bus = Arc::new(MessageBus::new());
//! let manager = ChannelManager::new(bus.clone());
//!
//! let telegram = TelegramChannel::new(TelegramConfig::default(), bus);
//! manager.register(Box::new(telegram)).await;
//! assert!(manager.has_channel("telegram").await);
//! # })
//! ```

mod manager;
pub mod telegram;
mod types;

pub use manager::ChannelManager;
pub use telegram::TelegramChannel;
pub use types::{BaseChannelConfig, Channel};
