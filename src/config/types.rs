//! Configuration type definitions for LinkRelay
//!
//! This module defines all configuration structs used by the relay.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};

/// Shortening endpoint used when none is configured.
pub const DEFAULT_SHORTENER_ENDPOINT: &str = "https://www.terasharelinks.xyz/api";

/// Main configuration struct for LinkRelay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Telegram bot configuration
    pub telegram: TelegramConfig,
    /// Shortening API configuration
    pub shortener: ShortenerConfig,
    /// Per-user settings store configuration
    pub store: StoreConfig,
    /// Operator notification configuration
    pub notify: NotifyConfig,
    /// Liveness server configuration
    pub health: HealthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Telegram Configuration
// ============================================================================

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the channel is enabled
    pub enabled: bool,
    /// Bot token from BotFather
    pub token: String,
    /// Allowlist of user IDs (empty = allow all unless `deny_by_default`)
    pub allow_from: Vec<String>,
    /// Reject everyone when the allowlist is empty
    pub deny_by_default: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: String::new(),
            allow_from: Vec::new(),
            deny_by_default: false,
        }
    }
}

// ============================================================================
// Shortener Configuration
// ============================================================================

/// Shortening API configuration.
///
/// The endpoint is process-wide; users only supply their own API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    /// Base URL of the shortening API
    pub endpoint: String,
    /// Service name used in the welcome message
    pub service_name: String,
    /// Page where users copy their API key
    pub api_page: String,
    /// Text substituted for a link whose shortening call failed
    pub failure_message: String,
    /// Request timeout; `None` keeps the HTTP client default
    pub timeout_secs: Option<u64>,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SHORTENER_ENDPOINT.to_string(),
            service_name: "TeraShareLinks".to_string(),
            api_page: "https://terasharelinks.xyz/member/tools/api".to_string(),
            failure_message: "An error occurred while shortening the link.".to_string(),
            timeout_secs: None,
        }
    }
}

// ============================================================================
// Store / Notify / Health
// ============================================================================

/// Settings store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON settings file (default: `~/.linkrelay/settings.json`)
    pub path: Option<String>,
}

/// Operator notification configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotifyConfig {
    /// Chat IDs that receive new-user and settings-change notices
    pub chat_ids: Vec<String>,
}

/// Liveness server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Whether to start the liveness server
    pub enabled: bool,
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format for log lines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, coloured
    Pretty,
    /// Compact single-line text with component tags
    #[default]
    Component,
    /// JSON lines
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "component" => Ok(LogFormat::Component),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Optional file to append JSON logs to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
