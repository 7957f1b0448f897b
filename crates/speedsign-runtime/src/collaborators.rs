//! Capability traits for everything the control cycle talks to.
//!
//! Hardware and process adapters live in the binary and UI crates; the
//! runtime only sees these traits, which keeps the cycle testable with
//! scripted fakes.

use std::time::{Duration, Instant};

use chrono::Local;
use speedsign_core::error::Result;
use speedsign_core::models::Timestamp;
use tracing::debug;

/// Source of raw radar frames.
pub trait FrameSource: Send {
    /// Read one frame, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing (or only part of a frame) arrived in
    /// time. The bytes are not validated here.
    fn read_frame(&mut self, timeout: Duration) -> std::io::Result<Option<Vec<u8>>>;
}

/// Alert relay. Both calls must be idempotent.
pub trait Relay: Send {
    fn engage(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// External video recorder.
pub trait VideoCapture: Send {
    /// Start recording `session_id` for `duration_secs`. Fire-and-forget: the
    /// recording outlives this call and its failure is not reported back.
    fn start_capture(&mut self, session_id: &str, duration_secs: u64) -> Result<()>;
}

/// Speed display.
pub trait Display: Send {
    fn render(&mut self, speed: u32, over_limit: bool);
}

/// Wall and monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

// ── Default implementations ───────────────────────────────────────────────────

/// The system clocks. Monotonic time counts from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(Local::now(), self.origin.elapsed())
    }
}

/// Relay stand-in used when no relay is configured.
#[derive(Debug, Default)]
pub struct NoRelay;

impl Relay for NoRelay {
    fn engage(&mut self) -> Result<()> {
        debug!("relay not configured; engage skipped");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        debug!("relay not configured; release skipped");
        Ok(())
    }
}

/// Capture stand-in used when no camera is configured.
#[derive(Debug, Default)]
pub struct NoCapture;

impl VideoCapture for NoCapture {
    fn start_capture(&mut self, session_id: &str, duration_secs: u64) -> Result<()> {
        debug!(session_id, duration_secs, "camera not configured; capture skipped");
        Ok(())
    }
}

/// Display stand-in for headless runs.
#[derive(Debug, Default)]
pub struct NoDisplay;

impl Display for NoDisplay {
    fn render(&mut self, _speed: u32, _over_limit: bool) {}
}
