//! Channel trait and shared channel configuration.

use async_trait::async_trait;

use crate::bus::OutboundMessage;
use crate::error::Result;

/// A chat platform connection.
///
/// Channels publish what users send onto the message bus and deliver
/// [`OutboundMessage`]s (text, or media with a caption) back to them.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use linkrelay::bus::OutboundMessage;
/// use linkrelay::channels::{BaseChannelConfig, Channel};
/// use linkrelay::error::Result;
///
/// struct ConsoleChannel {
///     config: BaseChannelConfig,
///     running: bool,
/// }
///
/// #[async_trait]
/// impl Channel for ConsoleChannel {
///     fn name(&self) -> &str {
///         &self.config.name
///     }
///
///     async fn start(&mut self) -> Result<()> {
///         self.running = true;
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<()> {
///         self.running = false;
///         Ok(())
///     }
///
///     async fn send(&self, msg: OutboundMessage) -> Result<()> {
///         println!("{}: {}", msg.chat_id, msg.content);
///         Ok(())
///     }
///
///     fn is_running(&self) -> bool {
///         self.running
///     }
///
///     fn is_allowed(&self, user_id: &str) -> bool {
///         self.config.is_allowed(user_id)
///     }
/// }
/// ```
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name used to route outbound messages (e.g. "telegram").
    fn name(&self) -> &str;

    /// Connect and begin publishing inbound messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot start (bad token, network).
    async fn start(&mut self) -> Result<()>;

    /// Disconnect and release resources.
    async fn stop(&mut self) -> Result<()>;

    /// Deliver one outbound message.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the message or is unreachable.
    async fn send(&self, msg: OutboundMessage) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Whether `user_id` may use the bot through this channel.
    fn is_allowed(&self, user_id: &str) -> bool;
}

/// Configuration shared by all channels.
///
/// # Example
///
/// ```
/// use linkrelay::channels::BaseChannelConfig;
///
/// let config = BaseChannelConfig::with_allowlist("telegram", vec!["123".to_string()]);
/// assert!(config.is_allowed("123"));
/// assert!(!config.is_allowed("456"));
///
/// let open = BaseChannelConfig::new("telegram");
/// assert!(open.is_allowed("anyone"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BaseChannelConfig {
    pub name: String,
    /// Allowed user ids. Empty allows everyone unless `deny_by_default`.
    pub allowlist: Vec<String>,
    /// Reject everyone while the allowlist is empty.
    pub deny_by_default: bool,
}

impl BaseChannelConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_allowlist(name: &str, allowlist: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            allowlist,
            deny_by_default: false,
        }
    }

    /// Set `deny_by_default` (builder pattern).
    pub fn deny_by_default(mut self, deny: bool) -> Self {
        self.deny_by_default = deny;
        self
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        if self.allowlist.is_empty() {
            return !self.deny_by_default;
        }
        self.allowlist.iter().any(|allowed| allowed == user_id)
    }
}
