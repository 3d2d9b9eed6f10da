//! File system watcher for newly created files.
//!
//! This module wraps the [`notify`] crate and reports one [`FileEvent`] per
//! file creation anywhere under the watched tree. Directory creations are not
//! reported, but new subdirectories are watched as soon as they exist when the
//! watch is recursive. Files that existed before the watch started never
//! produce events.
//!
//! # Architecture
//!
//! The notify callback runs on notify's own thread and is kept lightweight:
//! it filters creation events and forwards them through a bounded channel.
//! Consumers drain the channel on their own execution context, so the caller
//! of [`FileWatcher::start`] never blocks on event delivery. Notification
//! failures are forwarded as [`WatchEvent::Error`] instead of stopping the
//! watch.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use hookwatch_monitor::watcher::{FileWatcher, WatchEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _watcher = FileWatcher::start(PathBuf::from("/tmp/incoming"), true, tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             WatchEvent::Created(file) => println!("New file: {:?}", file.path),
//!             WatchEvent::Error(message) => eprintln!("watch error: {message}"),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use notify::{
    event::CreateKind, Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Capacity of the channel between the notify callback and its consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// A single observed file creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Path of the new file.
    pub path: PathBuf,
    /// When the creation notification was received.
    pub detected_at: DateTime<Local>,
}

impl FileEvent {
    /// Creates an event for `path` stamped with the current time.
    #[must_use]
    pub fn now(path: PathBuf) -> Self {
        Self {
            path,
            detected_at: Local::now(),
        }
    }
}

/// Items emitted by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file was created.
    Created(FileEvent),

    /// The underlying notification source reported a failure.
    ///
    /// The watch stays active; this is informational.
    Error(String),
}

/// Errors that can occur when starting a watch.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The watch directory does not exist, is not a directory, or cannot be
    /// read.
    #[error("watch directory unavailable: {0}")]
    DirectoryUnavailable(PathBuf),

    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// An active watch subscription.
///
/// Dropping the watcher ends the subscription; no further events are sent
/// after the drop returns.
#[derive(Debug)]
pub struct FileWatcher {
    /// Kept alive to maintain the watch subscription.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    /// The root directory being watched.
    watch_dir: PathBuf,

    recursive: bool,
}

impl FileWatcher {
    /// Starts watching `watch_dir` for file creations.
    ///
    /// # Arguments
    ///
    /// * `watch_dir` - The root directory to watch
    /// * `recursive` - Whether to include subdirectories, present and future
    /// * `event_sender` - Channel receiving [`WatchEvent`]s
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::DirectoryUnavailable`] if the directory is
    /// missing or unreadable, and [`WatcherError::WatcherInit`] if the OS
    /// watch cannot be registered.
    pub fn start(
        watch_dir: PathBuf,
        recursive: bool,
        event_sender: mpsc::Sender<WatchEvent>,
    ) -> Result<Self> {
        if !watch_dir.is_dir() || std::fs::read_dir(&watch_dir).is_err() {
            return Err(WatcherError::DirectoryUnavailable(watch_dir));
        }

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                handle_notify_event(res, &event_sender);
            },
            Config::default(),
        )?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&watch_dir, mode)?;

        info!(
            watch_dir = %watch_dir.display(),
            recursive,
            "Started file watch"
        );

        Ok(Self {
            watcher,
            watch_dir,
            recursive,
        })
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Returns whether subdirectories are included.
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Ends the subscription.
    pub fn stop(self) {
        debug!(watch_dir = %self.watch_dir.display(), "Stopping file watch");
    }
}

/// Handles events from the notify crate.
///
/// Only filters and forwards; uses `try_send` so a slow consumer can never
/// stall notify's thread.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    event_sender: &mpsc::Sender<WatchEvent>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            forward(event_sender, WatchEvent::Error(e.to_string()));
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    for path in event.paths {
        if !is_file_creation(&event.kind, &path) {
            continue;
        }

        debug!(path = %path.display(), "New file detected");
        forward(event_sender, WatchEvent::Created(FileEvent::now(path)));
    }
}

fn forward(event_sender: &mpsc::Sender<WatchEvent>, event: WatchEvent) {
    if let Err(e) = event_sender.try_send(event) {
        warn!(error = %e, "Failed to queue watch event, channel may be full");
    }
}

/// Returns true if `kind` describes a file (not directory) creation.
///
/// Backends that cannot tell files from directories report `Any`/`Other`;
/// those are resolved by checking the path, and a path that is already gone
/// is treated as a file.
fn is_file_creation(kind: &EventKind, path: &Path) -> bool {
    match kind {
        EventKind::Create(CreateKind::File) => true,
        EventKind::Create(CreateKind::Folder) => false,
        EventKind::Create(_) => !path.is_dir(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind, RemoveKind};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    async fn next_created(rx: &mut mpsc::Receiver<WatchEvent>) -> Option<FileEvent> {
        loop {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(WatchEvent::Created(event))) => return Some(event),
                Ok(Some(WatchEvent::Error(_))) => continue,
                _ => return None,
            }
        }
    }

    #[test]
    fn test_is_file_creation() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");

        assert!(is_file_creation(&EventKind::Create(CreateKind::File), &file));
        assert!(!is_file_creation(
            &EventKind::Create(CreateKind::Folder),
            dir.path()
        ));
        assert!(is_file_creation(&EventKind::Create(CreateKind::Any), &file));
        assert!(!is_file_creation(
            &EventKind::Create(CreateKind::Any),
            dir.path()
        ));
        assert!(!is_file_creation(
            &EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &file
        ));
        assert!(!is_file_creation(
            &EventKind::Remove(RemoveKind::File),
            &file
        ));
    }

    #[test]
    fn test_notify_error_is_forwarded() {
        let (tx, mut rx) = mpsc::channel(4);
        handle_notify_event(Err(notify::Error::generic("queue overflow")), &tx);

        match rx.try_recv() {
            Ok(WatchEvent::Error(message)) => assert!(message.contains("queue overflow")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/w/a"))
            .add_path(PathBuf::from("/w/b"));

        handle_notify_event(Ok(event), &tx);

        assert!(matches!(rx.try_recv(), Ok(WatchEvent::Created(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_missing_directory() {
        let (tx, _rx) = mpsc::channel(10);
        let result = FileWatcher::start(PathBuf::from("/nonexistent/path"), true, tx);

        assert!(matches!(
            result.unwrap_err(),
            WatcherError::DirectoryUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_start_on_regular_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();

        let (tx, _rx) = mpsc::channel(10);
        assert!(matches!(
            FileWatcher::start(file, true, tx),
            Err(WatcherError::DirectoryUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reports_new_file_not_existing_ones() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("old.txt"), "old").unwrap();

        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let watcher = FileWatcher::start(dir.path().to_path_buf(), true, tx).unwrap();
        assert_eq!(watcher.watch_dir(), dir.path());
        assert!(watcher.is_recursive());

        let new_file = dir.path().join("new.txt");
        fs::write(&new_file, "new").unwrap();

        let event = next_created(&mut rx).await.expect("creation event");
        assert_eq!(event.path.file_name(), new_file.file_name());

        watcher.stop();
    }

    #[tokio::test]
    async fn test_reports_files_in_new_subdirectory() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let _watcher = FileWatcher::start(dir.path().to_path_buf(), true, tx).unwrap();

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        // Give the backend time to register the new directory.
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(sub.join("inner.txt"), "x").unwrap();

        let event = next_created(&mut rx).await.expect("creation event");
        assert!(event.path.ends_with("sub/inner.txt"));
    }

    #[test]
    fn test_watcher_error_display() {
        let err = WatcherError::DirectoryUnavailable(PathBuf::from("/test/path"));
        assert_eq!(err.to_string(), "watch directory unavailable: /test/path");
    }
}
