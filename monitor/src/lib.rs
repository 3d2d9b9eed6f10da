//! Hookwatch - reports newly created files to a webhook.
//!
//! This crate watches a directory tree and, for every file created inside it,
//! posts a templated message to an HTTP webhook (Discord-style
//! `{"content": "..."}` payloads).
//!
//! # Overview
//!
//! Each creation flows one way through the pipeline:
//!
//! ```text
//! watcher → metadata → template → dispatcher → log sink
//! ```
//!
//! Failures while handling a single file are logged and never stop the
//! watch. Only configuration and setup errors prevent a session from
//! starting.
//!
//! # Modules
//!
//! - [`settings`]: Watch settings and the JSON settings file
//! - [`config`]: Configuration from environment variables
//! - [`watcher`]: File system watcher for new files
//! - [`metadata`]: Per-file metadata with `Unknown` fallbacks
//! - [`template`]: `{placeholder}` message templates
//! - [`dispatcher`]: Webhook delivery and outcome classification
//! - [`log_sink`]: Timestamped status lines and a bounded buffer
//! - [`pipeline`]: Start/stop lifecycle wiring everything together
//! - [`error`]: Error types for monitor operations

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod log_sink;
pub mod metadata;
pub mod pipeline;
pub mod settings;
pub mod template;
pub mod watcher;

pub use config::{Config, ConfigError};
pub use dispatcher::{DeliveryResult, DispatchError, WebhookDispatcher};
pub use error::{MonitorError, Result};
pub use log_sink::{LogBuffer, LogEntry, LogSink};
pub use metadata::{FileMetadata, UNKNOWN};
pub use pipeline::{
    send_test_message, NotificationPipeline, PipelineError, PipelineOptions, PipelineState,
};
pub use settings::{SettingsError, SettingsStore, WatchSettings};
pub use template::{Template, TemplateError};
pub use watcher::{FileEvent, FileWatcher, WatchEvent, WatcherError};
