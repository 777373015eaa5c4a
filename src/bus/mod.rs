//! Message Bus Module
//!
//! This module provides the message bus that decouples the chat channels from
//! the relay loop. Channels publish inbound messages; the relay loop and the
//! operator notifier publish outbound messages which the channel manager
//! delivers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Channel   │────>│  MessageBus │────>│  RelayLoop  │
//! │  (Telegram) │     │  (inbound)  │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            │ outbound
//!                            ▼
//! ┌─────────────┐     ┌─────────────┐
//! │   Channel   │<────│  MessageBus │
//! │  (Telegram) │     │  (outbound) │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use linkrelay::bus::{MessageBus, InboundMessage};
//!
//! # tokio_test::block_on(async {
//! let bus = MessageBus::new();
//! let msg = InboundMessage::new("telegram", "user123", "chat456", "https://example.com");
//! bus.publish_inbound(msg).await.unwrap();
//!
//! let received = bus.consume_inbound().await.unwrap();
//! assert_eq!(received.chat_id, "chat456");
//! # })
//! ```

pub mod message;

pub use message::{InboundMessage, MediaAttachment, MediaType, OutboundMessage, SenderProfile};

use crate::error::{RelayError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Default buffer size for message channels
const DEFAULT_BUFFER_SIZE: usize = 100;

/// The central message bus for routing messages between channels and the relay.
///
/// Both directions use bounded tokio MPSC queues. Receivers sit behind a
/// mutex so a cloned bus shares the same consumers.
pub struct MessageBus {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Arc<Mutex<mpsc::Receiver<InboundMessage>>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Arc<Mutex<mpsc::Receiver<OutboundMessage>>>,
}

impl MessageBus {
    /// Creates a new `MessageBus` with the default buffer size (100).
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Creates a new `MessageBus` with a custom buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer_size);

        Self {
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(outbound_rx)),
        }
    }

    /// Publishes an inbound message to the bus.
    ///
    /// # Errors
    /// Returns `RelayError::BusClosed` if the receiver has been dropped.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        self.inbound_tx
            .send(msg)
            .await
            .map_err(|_| RelayError::BusClosed)
    }

    /// Consumes the next inbound message from the bus.
    ///
    /// Returns `None` once every sender has been dropped.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound_rx.lock().await.recv().await
    }

    /// Publishes an outbound message to the bus.
    ///
    /// # Errors
    /// Returns `RelayError::BusClosed` if the receiver has been dropped.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(msg)
            .await
            .map_err(|_| RelayError::BusClosed)
    }

    /// Consumes the next outbound message from the bus.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Tries to publish an inbound message without blocking.
    ///
    /// # Returns
    /// - `Err(RelayError::BusClosed)` if the channel is closed
    /// - `Err(RelayError::Channel)` if the buffer is full
    pub fn try_publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        self.inbound_tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RelayError::Channel("inbound buffer full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => RelayError::BusClosed,
        })
    }

    /// Tries to publish an outbound message without blocking.
    pub fn try_publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound_tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RelayError::Channel("outbound buffer full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => RelayError::BusClosed,
        })
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MessageBus {
    /// Clones the message bus, sharing the same underlying channels.
    fn clone(&self) -> Self {
        Self {
            inbound_tx: self.inbound_tx.clone(),
            inbound_rx: Arc::clone(&self.inbound_rx),
            outbound_tx: self.outbound_tx.clone(),
            outbound_rx: Arc::clone(&self.outbound_rx),
        }
    }
}
