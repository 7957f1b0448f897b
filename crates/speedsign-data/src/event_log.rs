//! Append-only speed log persisted as a JSON array.
//!
//! Every mutation is a read-modify-write over the whole array, serialised by
//! a per-handle mutex plus an advisory lock on `<log>.lock` (so a separate
//! `--clear` process cannot interleave with the sign loop) and committed with
//! an atomic rename. A missing or corrupt
//! file reads as an empty log; the next append rewrites it as a valid array.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use speedsign_core::error::Result;
use speedsign_core::models::LogEntry;
use tracing::{debug, warn};

use crate::fs_utils::{read_optional, with_file_lock, write_atomic};

// ── LogMark ───────────────────────────────────────────────────────────────────

/// Point-in-time fingerprint of the log, used to detect activity between a
/// cleanup being scheduled and it running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMark {
    /// Number of appends made through this handle.
    pub generation: u64,
    /// Number of persisted entries; catches appends from other processes.
    pub len: usize,
}

// ── EventLog ──────────────────────────────────────────────────────────────────

/// File-backed speed log shared by the orchestration loop and cleanup tasks.
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
    generation: AtomicU64,
}

impl EventLog {
    /// Create a log backed by `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry` and return the new number of entries.
    pub fn append(&self, entry: &LogEntry) -> Result<usize> {
        let entries = self.exclusive(|| {
            let mut entries = read_entries(&self.path);
            entries.push(entry.clone());
            write_entries(&self.path, &entries)?;
            self.generation.fetch_add(1, Ordering::SeqCst);
            Ok(entries)
        })?;

        debug!(
            speed = entry.speed,
            video = entry.session_ref.as_str(),
            len = entries.len(),
            "log entry appended"
        );
        Ok(entries.len())
    }

    /// All persisted entries in append order; empty when absent or corrupt.
    pub fn read_all(&self) -> Vec<LogEntry> {
        self.shared(|| read_entries(&self.path))
    }

    /// Reset the log to an empty array.
    pub fn clear(&self) -> Result<()> {
        self.exclusive(|| write_entries(&self.path, &[]))?;
        debug!(path = %self.path.display(), "log cleared");
        Ok(())
    }

    /// Capture the current [`LogMark`].
    pub fn mark(&self) -> LogMark {
        self.shared(|| self.current_mark())
    }

    /// Clear the log only if nothing was appended since `mark` was taken.
    ///
    /// The comparison and the clear happen under the same lock, so an append
    /// can never be wiped by a stale cleanup. Returns `true` when cleared.
    pub fn clear_if_unchanged(&self, mark: LogMark) -> Result<bool> {
        self.exclusive(|| {
            let current = self.current_mark();
            if current != mark {
                debug!(?mark, ?current, "log changed since mark; not clearing");
                return Ok(false);
            }

            write_entries(&self.path, &[])?;
            Ok(true)
        })
    }

    /// Number of appends made through this handle since it was created.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn current_mark(&self) -> LogMark {
        LogMark {
            generation: self.generation.load(Ordering::SeqCst),
            len: read_entries(&self.path).len(),
        }
    }

    /// Run a mutation under both the handle mutex and the file lock.
    fn exclusive<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock();
        with_file_lock(&self.path, f)?
    }

    /// Run a read under the locks, reading unlocked if the lock file is
    /// unavailable (e.g. a read-only data directory).
    fn shared<T>(&self, f: impl Fn() -> T) -> T {
        let _guard = self.lock.lock();
        with_file_lock(&self.path, &f).unwrap_or_else(|e| {
            warn!(error = %e, "speed log lock unavailable; reading unlocked");
            f()
        })
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn read_entries(path: &Path) -> Vec<LogEntry> {
    let content = match read_optional(path) {
        Ok(Some(content)) => content,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "speed log unreadable; treating as empty");
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<LogEntry>>(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "speed log is corrupt; treating as empty");
            Vec::new()
        }
    }
}

/// Serialise with 4-space indentation, matching what consumers already parse.
fn write_entries(path: &Path, entries: &[LogEntry]) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entries.serialize(&mut ser)?;
    write_atomic(path, &buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
