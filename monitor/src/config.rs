//! Configuration module for Hookwatch.
//!
//! Watch settings are read from the settings file (see [`crate::settings`])
//! and can be overridden per process with environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `HOOKWATCH_CONFIG_DIR` | No | `~/.hookwatch` | Directory containing `config.json` |
//! | `HOOKWATCH_WEBHOOK_URL` | No | stored value | Webhook URL override |
//! | `HOOKWATCH_WATCH_DIR` | No | stored value | Watch directory override |
//! | `HOOKWATCH_TEMPLATE` | No | stored value | Message template override |
//! | `HOOKWATCH_TIMEOUT_SECS` | No | 10 | Webhook request timeout |
//! | `HOOKWATCH_SETTLE_MS` | No | 100 | Delay before reading a new file |
//!
//! # Example
//!
//! ```no_run
//! use hookwatch_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Watching: {}", config.settings.watch_dir.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

use crate::settings::{SettingsError, SettingsStore, WatchSettings};

/// Default settings directory name relative to home.
const DEFAULT_CONFIG_DIR: &str = ".hookwatch";

/// Default webhook timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default settle delay in milliseconds.
const DEFAULT_SETTLE_MS: u64 = 100;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,

    /// The settings file could not be loaded.
    #[error("failed to load settings: {0}")]
    Settings(#[from] SettingsError),
}

/// Configuration for a Hookwatch process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the settings file.
    pub config_dir: PathBuf,

    /// Effective watch settings (stored values plus overrides).
    pub settings: WatchSettings,

    /// Webhook request timeout.
    pub timeout: Duration,

    /// Delay between detecting a file and reading its metadata.
    pub settle_delay: Duration,
}

impl Config {
    /// Creates a new `Config` from the settings file and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - A numeric variable is set but is not a positive integer
    /// - The home directory cannot be determined (needed for the default path)
    /// - The settings file exists but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        let config_dir = config_dir_from_env()?;
        let mut settings = SettingsStore::new(&config_dir).load()?;

        if let Ok(url) = env::var("HOOKWATCH_WEBHOOK_URL") {
            settings.webhook_url = url;
        }
        if let Ok(dir) = env::var("HOOKWATCH_WATCH_DIR") {
            settings.watch_dir = PathBuf::from(dir);
        }
        if let Ok(template) = env::var("HOOKWATCH_TEMPLATE") {
            settings.message_template = template;
        }

        let timeout_secs = parse_positive("HOOKWATCH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        // Zero is allowed: disables the settle delay.
        let settle_ms = match env::var("HOOKWATCH_SETTLE_MS") {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "HOOKWATCH_SETTLE_MS".to_string(),
                message: format!("expected non-negative integer, got '{val}'"),
            })?,
            Err(_) => DEFAULT_SETTLE_MS,
        };

        Ok(Self {
            config_dir,
            settings,
            timeout: Duration::from_secs(timeout_secs),
            settle_delay: Duration::from_millis(settle_ms),
        })
    }
}

/// Resolves the settings directory from `HOOKWATCH_CONFIG_DIR` or home.
pub fn config_dir_from_env() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = env::var("HOOKWATCH_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(base_dirs.home_dir().join(DEFAULT_CONFIG_DIR))
}

/// Parses `key` as an integer greater than zero, or returns `default`.
fn parse_positive<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Ok(val) = env::var(key) else {
        return Ok(default);
    };

    let parsed = val.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected positive integer, got '{val}'"),
    })?;

    if parsed == T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value must be greater than 0".to_string(),
        });
    }

    Ok(parsed)
}
