//! Per-file metadata derived when a new file is detected.
//!
//! Extraction is best-effort: each field that needs filesystem access (size,
//! sibling count, content hash) is derived independently, and a failure in
//! one of them leaves that field as `None` instead of aborting. Missing
//! values render as the [`UNKNOWN`] sentinel so a half-written or already
//! deleted file is still reported.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, trace};

/// Sentinel rendered for any field whose derivation failed.
pub const UNKNOWN: &str = "Unknown";

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Read buffer size used while hashing.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Descriptive fields for one detected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Final path component, e.g. `a.txt`.
    pub filename: String,
    /// Directory containing the file, as reported by the watcher.
    pub directory: String,
    /// Absolute form of the file path.
    pub absolute_path: String,
    /// Size in bytes, if the file could be stat'ed.
    pub size_bytes: Option<u64>,
    /// Pre-rendered size, used when no byte count is available (test fixture).
    pub size_label: Option<String>,
    /// Extension including the leading dot, or empty.
    pub extension: String,
    /// Detection time.
    pub detected_at: DateTime<Local>,
    /// Name of the directory containing the file.
    pub parent_folder_name: String,
    /// Regular files directly inside [`directory`](Self::directory).
    pub sibling_file_count: Option<usize>,
    /// Lowercase hex MD5 of the whole file.
    pub content_hash: Option<String>,
}

impl FileMetadata {
    /// Human-readable size, or [`UNKNOWN`].
    #[must_use]
    pub fn human_size(&self) -> String {
        match (self.size_bytes, &self.size_label) {
            (Some(bytes), _) => human_size(bytes),
            (None, Some(label)) => label.clone(),
            (None, None) => UNKNOWN.to_string(),
        }
    }

    /// Detection time as `YYYY-MM-DD HH:MM:SS`.
    #[must_use]
    pub fn detected_at_iso(&self) -> String {
        self.detected_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Detection time of day as `HH:MM:SS`.
    #[must_use]
    pub fn time_of_day(&self) -> String {
        self.detected_at.format("%H:%M:%S").to_string()
    }

    /// Detection date as `YYYY-MM-DD`.
    #[must_use]
    pub fn date_only(&self) -> String {
        self.detected_at.format("%Y-%m-%d").to_string()
    }

    /// Detection time as whole Unix seconds.
    #[must_use]
    pub fn unix_timestamp(&self) -> i64 {
        self.detected_at.timestamp()
    }

    /// Alias of [`directory`](Self::directory).
    #[must_use]
    pub fn directory_path(&self) -> &str {
        &self.directory
    }

    /// Sibling count as text, or [`UNKNOWN`].
    #[must_use]
    pub fn sibling_count_label(&self) -> String {
        self.sibling_file_count
            .map_or_else(|| UNKNOWN.to_string(), |n| n.to_string())
    }

    /// Content hash, or [`UNKNOWN`].
    #[must_use]
    pub fn content_hash_label(&self) -> String {
        self.content_hash.clone().unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Synthetic metadata used to verify a webhook without a real file.
    #[must_use]
    pub fn sample(detected_at: DateTime<Local>) -> Self {
        Self {
            filename: "test.txt".to_string(),
            directory: "/test".to_string(),
            absolute_path: "/test/test.txt".to_string(),
            size_bytes: None,
            size_label: Some("1.5 KB".to_string()),
            extension: ".txt".to_string(),
            detected_at,
            parent_folder_name: "test".to_string(),
            sibling_file_count: Some(5),
            content_hash: Some("d41d8cd98f00b204e9800998ecf8427e".to_string()),
        }
    }
}

/// Formats a byte count using binary units.
///
/// Below 1024 bytes the exact count is shown; each boundary value uses the
/// next unit, so `1024` renders as `1.00 KB`.
#[must_use]
pub fn human_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else if bytes < GIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    }
}

/// Derives metadata for `path`, a file inside `directory`.
///
/// Never fails; see the module docs for the degradation policy.
#[must_use]
pub fn extract(path: &Path, directory: &Path, detected_at: DateTime<Local>) -> FileMetadata {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let absolute_path = std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned();

    let parent_folder_name = directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let size_bytes = match fs::metadata(path) {
        Ok(meta) => Some(meta.len()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Size unavailable");
            None
        }
    };

    let sibling_file_count = match count_regular_files(directory) {
        Ok(count) => Some(count),
        Err(e) => {
            debug!(dir = %directory.display(), error = %e, "Sibling count unavailable");
            None
        }
    };

    let content_hash = match md5_hex(path) {
        Ok(hash) => Some(hash),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Hash unavailable");
            None
        }
    };

    trace!(
        path = %path.display(),
        size = ?size_bytes,
        siblings = ?sibling_file_count,
        "Extracted file metadata"
    );

    FileMetadata {
        filename,
        directory: directory.to_string_lossy().into_owned(),
        absolute_path,
        size_bytes,
        size_label: None,
        extension,
        detected_at,
        parent_folder_name,
        sibling_file_count,
        content_hash,
    }
}

/// Returns the directory a detected file should be described relative to.
#[must_use]
pub fn parent_directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Counts regular files directly inside `dir`.
fn count_regular_files(dir: &Path) -> io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        // Follows symlinks, so a link to a regular file counts.
        if fs::metadata(entry?.path()).is_ok_and(|m| m.is_file()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Streams the file through MD5 and returns the lowercase hex digest.
fn md5_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }

    Ok(format!("{:x}", context.compute()))
}

impl fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.absolute_path, self.human_size())
    }
}
