//! Watch settings and their on-disk store.
//!
//! [`WatchSettings`] is the immutable value a watch session is started with.
//! [`SettingsStore`] persists it as pretty-printed JSON in `config.json`
//! inside a settings directory. Missing files and missing keys fall back to
//! defaults, so a fresh install loads as "incomplete" rather than failing.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Template used when none has been configured.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "File: {filename}\nDir: {dir}\nDate: {dirdate}";

/// File name of the persisted settings.
pub const SETTINGS_FILE_NAME: &str = "config.json";

/// Errors from validating or persisting settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Webhook URL is empty.
    #[error("webhook URL is not set")]
    MissingWebhookUrl,

    /// Watch directory is empty.
    #[error("watch directory is not set")]
    MissingWatchDirectory,

    /// Watch directory does not exist.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    /// Reading or writing the settings file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The settings file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SettingsError {
    /// Returns true if the error is an empty required field.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::MissingWebhookUrl | Self::MissingWatchDirectory)
    }
}

/// Settings for one watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Destination webhook.
    pub webhook_url: String,
    /// Directory tree to watch.
    pub watch_dir: PathBuf,
    /// Message template, see [`crate::template`].
    pub message_template: String,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            watch_dir: PathBuf::new(),
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

impl WatchSettings {
    /// Creates settings from explicit values.
    #[must_use]
    pub fn new(
        webhook_url: impl Into<String>,
        watch_dir: impl Into<PathBuf>,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            watch_dir: watch_dir.into(),
            message_template: message_template.into(),
        }
    }

    /// Checks the settings are usable for a watch session.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingWebhookUrl`] or
    /// [`SettingsError::MissingWatchDirectory`] for blank fields, and
    /// [`SettingsError::DirectoryNotFound`] if the directory does not exist.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.webhook_url.trim().is_empty() {
            return Err(SettingsError::MissingWebhookUrl);
        }
        if self.watch_dir.as_os_str().is_empty() {
            return Err(SettingsError::MissingWatchDirectory);
        }
        if !self.watch_dir.exists() {
            return Err(SettingsError::DirectoryNotFound(self.watch_dir.clone()));
        }
        Ok(())
    }
}

/// JSON-backed settings persistence.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the settings file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }

    /// Loads settings, returning defaults if no file has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<WatchSettings, SettingsError> {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Loaded settings file");
                Ok(serde_json::from_str(&contents)?)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file, using defaults");
                Ok(WatchSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes settings, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, settings: &WatchSettings) -> Result<(), SettingsError> {
        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(settings)?;
        fs::write(self.path(), contents)?;
        info!(path = %self.path().display(), "Saved settings");
        Ok(())
    }
}
