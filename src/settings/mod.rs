//! Per-user settings store for LinkRelay.
//!
//! Each user owns one [`UserSettings`] record: their shortening API key, an
//! optional header and footer, and whether the original post text is kept.
//! The whole map is stored as a single JSON file (default
//! `~/.linkrelay/settings.json`), read once at startup and rewritten after
//! every mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{RelayError, Result};

static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("static API key regex"));

fn default_text_enabled() -> bool {
    true
}

/// Returns `true` when `key` looks like a shortening API key
/// (exactly 40 lowercase hex characters).
pub fn is_valid_api_key(key: &str) -> bool {
    API_KEY_RE.is_match(key)
}

/// Settings owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Shortening API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Line placed above every reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Line placed below every reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Keep the post text around the links (default on).
    #[serde(default = "default_text_enabled")]
    pub text_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            header: None,
            footer: None,
            text_enabled: true,
        }
    }
}

/// Partial update merged into a user's record; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub text_enabled: Option<bool>,
}

impl SettingsUpdate {
    pub fn api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn header(header: &str) -> Self {
        Self {
            header: Some(header.to_string()),
            ..Default::default()
        }
    }

    pub fn footer(footer: &str) -> Self {
        Self {
            footer: Some(footer.to_string()),
            ..Default::default()
        }
    }

    pub fn text_enabled(enabled: bool) -> Self {
        Self {
            text_enabled: Some(enabled),
            ..Default::default()
        }
    }

    fn apply(self, settings: &mut UserSettings) {
        if let Some(key) = self.api_key {
            settings.api_key = Some(key);
        }
        if let Some(header) = self.header {
            settings.header = Some(header);
        }
        if let Some(footer) = self.footer {
            settings.footer = Some(footer);
        }
        if let Some(enabled) = self.text_enabled {
            settings.text_enabled = enabled;
        }
    }
}

/// Optional text fields that can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Header,
    Footer,
}

impl std::fmt::Display for SettingsField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsField::Header => write!(f, "header"),
            SettingsField::Footer => write!(f, "footer"),
        }
    }
}

/// Result of [`SettingsStore::remove_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotSet,
}

/// Settings for every user, persisted as one JSON document.
#[derive(Debug)]
pub struct SettingsStore {
    entries: HashMap<String, UserSettings>,
    storage_path: Option<PathBuf>,
}

impl SettingsStore {
    /// Open the store at `path`, loading any existing file.
    ///
    /// A missing or empty file yields an empty store. An unreadable or
    /// corrupt file is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = Self::load(&path)?;
        info!(path = %path.display(), users = entries.len(), "Settings store loaded");
        Ok(Self {
            entries,
            storage_path: Some(path),
        })
    }

    /// Open the store at `path`, starting empty if it cannot be loaded.
    ///
    /// The load error is logged and later mutations still try to write `path`.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(entries) => {
                info!(path = %path.display(), users = entries.len(), "Settings store loaded");
                Self {
                    entries,
                    storage_path: Some(path),
                }
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load settings store, starting empty");
                Self {
                    entries: HashMap::new(),
                    storage_path: Some(path),
                }
            }
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            entries: HashMap::new(),
            storage_path: None,
        }
    }

    /// Path the store persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    /// The stored record for `user_id`, if one exists.
    pub fn get(&self, user_id: &str) -> Option<&UserSettings> {
        self.entries.get(user_id)
    }

    /// The record for `user_id`, or defaults when the user is unknown.
    pub fn settings(&self, user_id: &str) -> UserSettings {
        self.entries.get(user_id).cloned().unwrap_or_default()
    }

    /// The user's API key. Unknown users have none.
    pub fn api_key(&self, user_id: &str) -> Option<&str> {
        self.entries
            .get(user_id)
            .and_then(|s| s.api_key.as_deref())
    }

    /// Merge `update` into the user's record and persist the store.
    ///
    /// The in-memory record is updated even if writing the file fails; the
    /// write error is returned so the caller can log it.
    pub async fn set(&mut self, user_id: &str, update: SettingsUpdate) -> Result<UserSettings> {
        let entry = self.entries.entry(user_id.to_string()).or_default();
        update.apply(entry);
        let snapshot = entry.clone();
        self.save().await?;
        Ok(snapshot)
    }

    /// Remove the header or footer from the user's record.
    ///
    /// Returns [`RemoveOutcome::NotSet`] without writing when there was
    /// nothing to remove.
    pub async fn remove_field(
        &mut self,
        user_id: &str,
        field: SettingsField,
    ) -> Result<RemoveOutcome> {
        let Some(entry) = self.entries.get_mut(user_id) else {
            return Ok(RemoveOutcome::NotSet);
        };
        let slot = match field {
            SettingsField::Header => &mut entry.header,
            SettingsField::Footer => &mut entry.footer,
        };
        if slot.take().is_none() {
            return Ok(RemoveOutcome::NotSet);
        }
        self.save().await?;
        Ok(RemoveOutcome::Removed)
    }

    /// User ids with a stored record, sorted.
    pub fn users(&self) -> Vec<&str> {
        let mut users: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        users.sort_unstable();
        users
    }

    /// Number of users with a stored record.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no user has a record.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the whole store to disk.
    ///
    /// The snapshot is serialized in place; the file work runs on the
    /// blocking pool.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = self.storage_path.clone() else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| RelayError::Store(format!("Failed to serialize settings: {}", e)))?;

        tokio::task::spawn_blocking(move || write_snapshot(&path, &json))
            .await
            .map_err(|e| RelayError::Store(format!("Settings write task failed: {}", e)))?
    }

    fn load(path: &Path) -> Result<HashMap<String, UserSettings>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Store(format!(
                "Failed to read settings from {}: {}",
                path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| RelayError::Store(format!("Failed to parse settings JSON: {}", e)))
    }
}

/// Write `json` next to `path` and rename it over the target.
fn write_snapshot(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            RelayError::Store(format!(
                "Failed to create settings directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| {
        RelayError::Store(format!(
            "Failed to write settings to {}: {}",
            tmp.display(),
            e
        ))
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        warn!(path = %tmp.display(), "Leaving temporary settings file behind");
        RelayError::Store(format!(
            "Failed to replace settings file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}
