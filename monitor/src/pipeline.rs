//! Notification pipeline: watch → metadata → template → webhook → log.
//!
//! [`NotificationPipeline`] owns the watch lifecycle. A successful
//! [`start`](NotificationPipeline::start) registers the OS watch and spawns a
//! dedicated worker thread running a single-threaded Tokio runtime. The
//! worker handles creation events strictly one at a time:
//!
//! 1. wait for the settle delay
//! 2. extract [`FileMetadata`]
//! 3. render the session's [`Template`]
//! 4. deliver through the [`WebhookDispatcher`]
//! 5. report the outcome to the [`LogSink`]
//!
//! [`stop`](NotificationPipeline::stop) signals the worker, lets any in-flight
//! delivery finish or time out, and joins the thread before returning, so a
//! following `start` never overlaps with the previous session.
//!
//! # State machine
//!
//! ```text
//! Stopped ──start──▶ Starting ──ok──▶ Running ──stop──▶ Stopping ──joined──▶ Stopped
//!                        │
//!                        └──error──▶ Stopped
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hookwatch_monitor::log_sink::LogBuffer;
//! use hookwatch_monitor::pipeline::{NotificationPipeline, PipelineOptions};
//! use hookwatch_monitor::settings::WatchSettings;
//!
//! let log = Arc::new(LogBuffer::default());
//! let pipeline = NotificationPipeline::new(PipelineOptions::default());
//!
//! let settings = WatchSettings::new(
//!     "https://discord.com/api/webhooks/123/abc",
//!     "/srv/incoming",
//!     "{alert} new file {filename} ({filesize})",
//! );
//! pipeline.start(settings, log.clone()).ok();
//! // ...
//! pipeline.stop();
//!
//! for line in log.lines() {
//!     println!("{line}");
//! }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DeliveryResult, DispatchError, WebhookDispatcher, DEFAULT_TIMEOUT};
use crate::log_sink::{LogEntry, LogSink};
use crate::metadata::{self, FileMetadata};
use crate::settings::{SettingsError, WatchSettings};
use crate::template::{Template, TemplateError};
use crate::watcher::{FileEvent, FileWatcher, WatchEvent, WatcherError, EVENT_CHANNEL_CAPACITY};

/// Default delay between a creation notification and the metadata read.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Name given to the worker thread.
const WORKER_THREAD_NAME: &str = "hookwatch-worker";

/// Lifecycle state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`NotificationPipeline::start`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A session is already active.
    #[error("already running")]
    AlreadyRunning,

    /// The pipeline is mid-transition.
    #[error("pipeline is {0}")]
    Busy(PipelineState),

    /// Settings are incomplete or point at a missing directory.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// The message template is invalid.
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),

    /// The webhook client could not be created.
    #[error("webhook setup failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// The directory watch could not be registered.
    #[error("watch failed: {0}")]
    Watch(#[from] WatcherError),

    /// The worker runtime could not be built.
    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl PipelineError {
    /// Returns true for errors caused by the supplied settings.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Settings(_) | Self::Template(_))
    }

    /// The status line reported to the log sink for this error.
    fn log_message(&self) -> String {
        match self {
            Self::AlreadyRunning => "✗ Already running".to_string(),
            Self::Busy(state) => format!("✗ Pipeline is {state}"),
            Self::Settings(e) if e.is_incomplete() => "✗ Config incomplete!".to_string(),
            Self::Settings(SettingsError::DirectoryNotFound(_)) => {
                "✗ Directory not found!".to_string()
            }
            Self::Settings(e) => format!("✗ Config error: {e}"),
            Self::Template(e) => format!("✗ Template error: {e}"),
            Self::Dispatch(e) => format!("✗ Webhook error: {e}"),
            Self::Watch(e) => format!("✗ Watch error: {e}"),
            Self::Runtime(e) | Self::Spawn(e) => format!("✗ Failed to start worker: {e}"),
        }
    }
}

/// Tunables that are not part of the user's watch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Webhook request timeout.
    pub timeout: Duration,
    /// Delay before reading metadata of a new file.
    pub settle_delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// State of an active watch session.
struct WatchSession {
    watch_dir: PathBuf,
    sink: Arc<dyn LogSink>,
    shutdown: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

struct Inner {
    state: PipelineState,
    session: Option<WatchSession>,
}

/// Watches a directory and reports each new file to a webhook.
pub struct NotificationPipeline {
    options: PipelineOptions,
    inner: Mutex<Inner>,
}

impl fmt::Debug for NotificationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationPipeline")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl NotificationPipeline {
    /// Creates a stopped pipeline.
    #[must_use]
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(Inner {
                state: PipelineState::Stopped,
                session: None,
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Returns true while a session is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Directory watched by the active session, if any.
    #[must_use]
    pub fn watch_dir(&self) -> Option<PathBuf> {
        self.lock().session.as_ref().map(|s| s.watch_dir.clone())
    }

    /// Starts a watch session.
    ///
    /// Every outcome is reported to `sink`; failures are also returned. On
    /// failure the pipeline stays [`PipelineState::Stopped`].
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyRunning`] if a session is active (no-op)
    /// - [`PipelineError::Busy`] while a stop is in progress
    /// - [`PipelineError::Settings`] / [`PipelineError::Template`] for
    ///   configuration errors
    /// - [`PipelineError::Watch`] if the directory cannot be watched
    pub fn start(&self, settings: WatchSettings, sink: Arc<dyn LogSink>) -> Result<(), PipelineError> {
        // The sink may call back into the pipeline, so it is only invoked
        // once the state lock has been released.
        match self.transition_to_running(settings, Arc::clone(&sink)) {
            Ok(()) => {
                report(sink.as_ref(), "✓ Monitoring started!");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to start pipeline");
                report(sink.as_ref(), e.log_message());
                Err(e)
            }
        }
    }

    fn transition_to_running(
        &self,
        settings: WatchSettings,
        sink: Arc<dyn LogSink>,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock();

        match inner.state {
            PipelineState::Stopped => {}
            PipelineState::Running => return Err(PipelineError::AlreadyRunning),
            other => return Err(PipelineError::Busy(other)),
        }

        inner.state = PipelineState::Starting;

        match self.launch(settings, sink) {
            Ok(session) => {
                info!(watch_dir = %session.watch_dir.display(), "Pipeline started");
                inner.session = Some(session);
                inner.state = PipelineState::Running;
                Ok(())
            }
            Err(e) => {
                inner.state = PipelineState::Stopped;
                Err(e)
            }
        }
    }

    /// Stops the active session and waits for its worker to exit.
    ///
    /// A delivery in progress is allowed to complete or time out first.
    /// Does nothing if no session is active.
    pub fn stop(&self) {
        let session = {
            let mut inner = self.lock();
            if inner.state != PipelineState::Running {
                return;
            }
            inner.state = PipelineState::Stopping;
            inner.session.take()
        };

        if let Some(session) = session {
            debug!(watch_dir = %session.watch_dir.display(), "Stopping pipeline");

            // The worker may already be gone; a failed send is fine.
            let _ = session.shutdown.send(());
            if session.worker.join().is_err() {
                error!("Pipeline worker panicked");
            }

            self.lock().state = PipelineState::Stopped;
            report(session.sink.as_ref(), "✓ Monitoring stopped");
        } else {
            self.lock().state = PipelineState::Stopped;
        }
    }

    fn launch(
        &self,
        settings: WatchSettings,
        sink: Arc<dyn LogSink>,
    ) -> Result<WatchSession, PipelineError> {
        settings.validate()?;
        let template = Template::parse(&settings.message_template)?;
        let dispatcher = WebhookDispatcher::new(settings.webhook_url, self.options.timeout)?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let watcher = FileWatcher::start(settings.watch_dir.clone(), true, event_tx)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PipelineError::Runtime)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handler = EventHandler {
            template,
            dispatcher,
            sink: Arc::clone(&sink),
            settle_delay: self.options.settle_delay,
        };

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(watcher, runtime, event_rx, shutdown_rx, handler))
            .map_err(PipelineError::Spawn)?;

        Ok(WatchSession {
            watch_dir: settings.watch_dir,
            sink,
            shutdown: shutdown_tx,
            worker,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationPipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl Drop for NotificationPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-event processing for one session.
struct EventHandler {
    template: Template,
    dispatcher: WebhookDispatcher,
    sink: Arc<dyn LogSink>,
    settle_delay: Duration,
}

impl EventHandler {
    async fn handle(&self, event: FileEvent) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let directory = metadata::parent_directory(&event.path);
        let meta = metadata::extract(&event.path, &directory, event.detected_at);
        let message = self.template.render(&meta);

        let outcome = self.dispatcher.deliver(&message).await;
        report(self.sink.as_ref(), outcome_message(&meta.filename, &outcome));
    }

    fn report(&self, message: impl Into<String>) {
        report(self.sink.as_ref(), message);
    }
}

/// Worker thread body: drains watch events until shutdown.
fn run_worker(
    watcher: FileWatcher,
    runtime: Runtime,
    events: mpsc::Receiver<WatchEvent>,
    shutdown: oneshot::Receiver<()>,
    handler: EventHandler,
) {
    runtime.block_on(drain_events(events, shutdown, &handler));

    watcher.stop();
    debug!("Pipeline worker exiting");
}

/// Handles events one at a time until `shutdown` fires or the channel closes.
///
/// Watch errors are reported and do not end the loop.
async fn drain_events(
    mut events: mpsc::Receiver<WatchEvent>,
    mut shutdown: oneshot::Receiver<()>,
    handler: &EventHandler,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            event = events.recv() => match event {
                Some(WatchEvent::Created(event)) => handler.handle(event).await,
                Some(WatchEvent::Error(message)) => {
                    handler.report(format!("⚠ Watch error: {message}"));
                }
                None => {
                    warn!("Watch event channel closed");
                    break;
                }
            },
        }
    }
}

/// Status line for a delivery outcome.
fn outcome_message(filename: &str, outcome: &DeliveryResult) -> String {
    match outcome {
        DeliveryResult::Delivered => format!("✓ Sent: {filename}"),
        DeliveryResult::Rejected(status) => format!("✗ Failed: {status}"),
        DeliveryResult::TransportError(description) => format!("✗ Error: {description}"),
    }
}

/// Appends a status line to `sink` and mirrors it to tracing at debug level.
fn report(sink: &dyn LogSink, message: impl Into<String>) {
    let entry = LogEntry::now(message);
    debug!(target: "hookwatch::status", "{}", entry.message);
    sink.append(entry);
}

/// Sends the configured template, rendered against sample metadata, to the
/// configured webhook.
///
/// Used to verify a webhook without creating a file. Shares the template and
/// delivery code with the watch pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::Settings`] if the webhook URL is empty,
/// [`PipelineError::Template`] for an invalid template, and
/// [`PipelineError::Dispatch`] if the client cannot be built.
pub async fn send_test_message(
    settings: &WatchSettings,
    timeout: Duration,
) -> Result<DeliveryResult, PipelineError> {
    if settings.webhook_url.trim().is_empty() {
        return Err(SettingsError::MissingWebhookUrl.into());
    }

    let template = Template::parse(&settings.message_template)?;
    let message = template.render(&FileMetadata::sample(Local::now()));
    let dispatcher = WebhookDispatcher::new(settings.webhook_url.clone(), timeout)?;

    Ok(dispatcher.deliver(&message).await)
}
