//! Configuration management for LinkRelay
//!
//! This module provides configuration loading, saving and validation.
//! Configuration is loaded from `~/.linkrelay/config.json` with environment variable overrides.

mod types;

pub use types::*;

use crate::error::{RelayError, Result};
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the LinkRelay configuration directory path (~/.linkrelay)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".linkrelay")
    }

    /// Returns the path to the config file (~/.linkrelay/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Config::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// The bare `BOT_TOKEN` and `PORT` variables are honoured for hosting
    /// platforms that inject them; the `LINKRELAY_` names take precedence.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Telegram
        if let Some(val) = get("LINKRELAY_TELEGRAM_TOKEN").or_else(|| get("BOT_TOKEN")) {
            self.telegram.token = val;
        }
        if let Some(val) = get("LINKRELAY_TELEGRAM_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.telegram.enabled = enabled;
            }
        }

        // Health
        if let Some(val) = get("LINKRELAY_HEALTH_HOST") {
            self.health.host = val;
        }
        if let Some(val) = get("LINKRELAY_HEALTH_PORT").or_else(|| get("PORT")) {
            if let Ok(port) = val.parse() {
                self.health.port = port;
            }
        }

        // Shortener
        if let Some(val) = get("LINKRELAY_SHORTENER_ENDPOINT") {
            self.shortener.endpoint = val;
        }

        // Store
        if let Some(val) = get("LINKRELAY_STORE_PATH") {
            self.store.path = Some(val);
        }

        // Notify
        if let Some(val) = get("LINKRELAY_NOTIFY_CHAT_IDS") {
            self.notify.chat_ids = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        // Logging
        if let Some(val) = get("LINKRELAY_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = get("LINKRELAY_LOG_FORMAT") {
            if let Ok(format) = val.parse() {
                self.logging.format = format;
            }
        }
    }

    /// Resolved path of the settings store file.
    pub fn store_path(&self) -> PathBuf {
        match self.store.path.as_deref() {
            Some(p) if !p.trim().is_empty() => expand_home(p),
            _ => Self::dir().join("settings.json"),
        }
    }

    /// Check the configuration for problems that would stop the bot.
    ///
    /// Returns every problem found rather than stopping at the first.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.telegram.enabled && self.telegram.token.trim().is_empty() {
            problems.push("telegram.token is empty (set BOT_TOKEN)".to_string());
        }

        match reqwest::Url::parse(&self.shortener.endpoint) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => problems.push(format!(
                "shortener.endpoint must be http or https, got '{}'",
                url.scheme()
            )),
            Err(e) => problems.push(format!(
                "shortener.endpoint '{}' is not a valid URL: {}",
                self.shortener.endpoint, e
            )),
        }

        for id in &self.notify.chat_ids {
            if id.parse::<i64>().is_err() {
                problems.push(format!("notify.chat_ids entry '{}' is not a chat id", id));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Like [`Config::validate`] but folds the problems into one error.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|problems| RelayError::Config(problems.join("; ")))
    }

    /// Copy of the config with secrets blanked, for display.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if !copy.telegram.token.is_empty() {
            copy.telegram.token = "***".to_string();
        }
        copy
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
