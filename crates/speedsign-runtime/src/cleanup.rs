//! Delayed deletion of collected artifacts and the speed log.
//!
//! A cleanup captures a [`LogMark`] when scheduled. When the delay elapses it
//! clears the log only if nothing was appended in the meantime, and deletes
//! the artifacts only if the log was cleared. Scheduling again replaces (and
//! aborts) the pending cleanup.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use speedsign_data::event_log::{EventLog, LogMark};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Default delay before a scheduled cleanup runs.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(10);

/// How a scheduled cleanup ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Log cleared; `deleted` artifacts removed (already-missing ones count
    /// as removed).
    Completed { deleted: usize },
    /// New entries arrived after scheduling; nothing was touched.
    Cancelled,
    /// The log could not be cleared.
    Failed(String),
}

/// Schedules delayed cleanups against one [`EventLog`].
pub struct CleanupScheduler {
    log: Arc<EventLog>,
    delay: Duration,
    pending: Mutex<Option<AbortHandle>>,
}

impl CleanupScheduler {
    pub fn new(log: Arc<EventLog>, delay: Duration) -> Self {
        Self {
            log,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule deletion of `artifacts` plus a log clear after the delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, artifacts: Vec<PathBuf>) -> JoinHandle<CleanupOutcome> {
        let mark = self.log.mark();
        let log = Arc::clone(&self.log);
        let delay = self.delay;

        debug!(?mark, artifacts = artifacts.len(), delay_ms = delay.as_millis() as u64, "cleanup scheduled");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_cleanup(log, mark, artifacts).await
        });

        if let Some(previous) = self.pending.lock().replace(handle.abort_handle()) {
            debug!("replacing pending cleanup");
            previous.abort();
        }
        handle
    }

    /// Abort the pending cleanup, if any. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                was_running
            }
            None => false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

async fn run_cleanup(log: Arc<EventLog>, mark: LogMark, artifacts: Vec<PathBuf>) -> CleanupOutcome {
    let cleared = tokio::task::spawn_blocking(move || log.clear_if_unchanged(mark)).await;
    match cleared {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => {
            info!("new log entries since cleanup was scheduled; cleanup cancelled");
            return CleanupOutcome::Cancelled;
        }
        Ok(Err(e)) => {
            warn!(error = %e, "failed to clear speed log");
            return CleanupOutcome::Failed(e.to_string());
        }
        Err(e) => {
            warn!(error = %e, "cleanup task failed");
            return CleanupOutcome::Failed(e.to_string());
        }
    }

    let mut deleted = 0;
    for path in &artifacts {
        match tokio::fs::remove_file(path).await {
            Ok(()) => deleted += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => deleted += 1,
            Err(e) => warn!(error = %e, path = %path.display(), "failed to delete artifact"),
        }
    }
    info!(deleted, "cleanup completed");
    CleanupOutcome::Completed { deleted }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
