//! User-facing status log for the notification pipeline.
//!
//! The pipeline reports every lifecycle transition and every delivery outcome
//! as a [`LogEntry`] handed to a [`LogSink`]. Sinks are invoked from the
//! watcher's worker thread while a presentation layer may read accumulated
//! lines from another thread, so implementations must be `Send + Sync`.
//!
//! [`LogBuffer`] is the stock sink: a mutex-guarded ring that keeps the most
//! recent entries (50 by default) and evicts the oldest first.
//!
//! # Example
//!
//! ```
//! use hookwatch_monitor::log_sink::{LogBuffer, LogEntry, LogSink};
//!
//! let buffer = LogBuffer::new(2);
//! buffer.append(LogEntry::now("one"));
//! buffer.append(LogEntry::now("two"));
//! buffer.append(LogEntry::now("three"));
//!
//! assert_eq!(buffer.messages(), vec!["two".to_string(), "three".to_string()]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::warn;

/// Default number of entries retained by a [`LogBuffer`].
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Timestamp format used as the prefix of every rendered log line.
const TIME_PREFIX_FORMAT: &str = "%H:%M:%S";

/// A single status line with the wall-clock time it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the entry was produced.
    pub at: DateTime<Local>,
    /// The bare message, without the time prefix.
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current local time.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format(TIME_PREFIX_FORMAT), self.message)
    }
}

/// Consumer of pipeline status lines.
pub trait LogSink: Send + Sync {
    /// Appends one entry. Called in the order entries are produced.
    fn append(&self, entry: LogEntry);
}

/// Bounded, thread-safe log buffer.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogBuffer {
    /// Creates a buffer retaining at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a snapshot of the retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Returns the retained entries rendered as `[HH:MM:SS] message`.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    /// Returns the retained messages without their time prefix.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns true if nothing has been logged yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogSink for LogBuffer {
    fn append(&self, entry: LogEntry) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Log buffer lock poisoned, recovering");
                poisoned.into_inner()
            }
        };

        while guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }
}
