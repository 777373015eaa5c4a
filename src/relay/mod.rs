//! The relay loop.
//!
//! [`RelayLoop`] consumes inbound messages from the bus and hands each one to
//! the [`ConversationController`] in its own task, so slow shortening calls
//! for one user never hold up another. Messages from the same user are
//! processed one at a time, in arrival order. Replies go back on the
//! outbound queue and operator events go to the [`Notifier`].

pub mod commands;
pub mod conversation;
pub mod pipeline;
pub mod replies;

pub use commands::Command;
pub use conversation::{ConversationController, ConversationState, Outcome, SETTINGS_STORE_CHECK};
pub use pipeline::{LinkPipeline, PipelineOutput};
pub use replies::Replies;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use crate::bus::{InboundMessage, MessageBus, OutboundMessage};
use crate::error::{RelayError, Result};
use crate::health::RelayMetrics;
use crate::notify::Notifier;
use crate::utils::string::preview;

/// Drives the conversation controller from the message bus.
///
/// # Example
///
/// ```rust,ignore
/// let relay = Arc::new(RelayLoop::new(bus, controller, notifier, metrics));
/// let handle = tokio::spawn({
///     let relay = Arc::clone(&relay);
///     async move { relay.start().await }
/// });
/// // ...
/// relay.stop();
/// ```
pub struct RelayLoop {
    bus: Arc<MessageBus>,
    controller: Arc<ConversationController>,
    notifier: Arc<Notifier>,
    metrics: Arc<RelayMetrics>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    /// Last task spawned per sender; the next one waits for it
    user_tails: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RelayLoop {
    pub fn new(
        bus: Arc<MessageBus>,
        controller: Arc<ConversationController>,
        notifier: Arc<Notifier>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bus,
            controller,
            notifier,
            metrics,
            running: AtomicBool::new(false),
            shutdown_tx,
            user_tails: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Process inbound messages until [`RelayLoop::stop`] is called or the
    /// inbound queue closes.
    ///
    /// # Errors
    /// Returns `RelayError::Config` if the loop is already running.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RelayError::Config("Relay loop already running".into()));
        }
        info!("Starting relay loop");

        // Subscribe fresh and consume any stale stop signal from a previous run.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let _ = *shutdown_rx.borrow_and_update();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Received shutdown signal");
                        break;
                    }
                }
                msg = self.bus.consume_inbound() => {
                    match msg {
                        Some(msg) => self.dispatch(msg).await,
                        None => {
                            info!("Inbound channel closed");
                            break;
                        }
                    }
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Relay loop stopped");
        Ok(())
    }

    /// Signal the loop to stop. In-flight messages finish in their own tasks.
    pub fn stop(&self) {
        info!("Stopping relay loop");
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
    }

    async fn dispatch(&self, msg: InboundMessage) {
        self.metrics.record_message();
        let span = info_span!(
            "message",
            channel = %msg.channel,
            chat_id = %msg.chat_id,
            sender = %msg.sender_id(),
            message_id = msg.metadata.get("message_id").map(String::as_str).unwrap_or("-"),
        );
        let user_id = msg.sender_id().to_string();
        let bus = Arc::clone(&self.bus);
        let controller = Arc::clone(&self.controller);
        let notifier = Arc::clone(&self.notifier);
        let metrics = Arc::clone(&self.metrics);

        let mut tails = self.user_tails.lock().await;
        let previous = tails.remove(&user_id);
        let handle = tokio::spawn(
            async move {
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                handle_message(&msg, &bus, &controller, &notifier, &metrics).await;
            }
            .instrument(span),
        );
        tails.retain(|_, tail| !tail.is_finished());
        tails.insert(user_id, handle);
    }
}

/// Handle one message end to end.
///
/// Errors and panics from the handler are logged and answered with the
/// generic error reply; they never take down the loop.
async fn handle_message(
    msg: &InboundMessage,
    bus: &MessageBus,
    controller: &ConversationController,
    notifier: &Notifier,
    metrics: &RelayMetrics,
) {
    let start = std::time::Instant::now();
    debug!(
        text = %preview(msg.text.as_deref().or(msg.caption.as_deref()).unwrap_or_default(), 80),
        media = msg.media.as_ref().map(|m| m.media_type.as_str()).unwrap_or("none"),
        "Processing message"
    );

    let result = AssertUnwindSafe(process(msg, bus, controller, notifier))
        .catch_unwind()
        .await;

    let failure = match result {
        Ok(Ok(())) => {
            info!(
                latency_ms = start.elapsed().as_millis() as u64,
                "Message handled"
            );
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };

    error!(error = %failure, "Message handling failed");
    metrics.record_error();
    let reply = OutboundMessage::reply_to(msg, replies::UNEXPECTED_ERROR);
    if let Err(e) = bus.publish_outbound(reply).await {
        error!(error = %e, "Failed to publish error reply");
    }
}

async fn process(
    msg: &InboundMessage,
    bus: &MessageBus,
    controller: &ConversationController,
    notifier: &Notifier,
) -> Result<()> {
    let outcome = controller.handle(msg).await;
    for reply in outcome.replies {
        bus.publish_outbound(reply).await?;
    }
    for event in &outcome.events {
        notifier.notify(event).await;
    }
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
