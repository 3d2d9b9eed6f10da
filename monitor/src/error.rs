//! Error types for Hookwatch.
//!
//! Each module owns a focused error enum; [`MonitorError`] aggregates them
//! for callers that want a single type, such as the `hookwatch save` command.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatcher::DispatchError;
use crate::pipeline::PipelineError;
use crate::settings::SettingsError;
use crate::template::TemplateError;
use crate::watcher::WatcherError;

/// Errors that can occur during monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid or unreadable watch settings.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Message template error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Webhook client setup error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// Pipeline lifecycle error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
