//! Radar reader: turns transport frames into speed samples.
//!
//! The reader holds the last good speed. A timeout, a short read, a bad
//! terminator or a transport error all leave it untouched, so "no new frame"
//! means "speed unchanged", never "speed zero".

use std::time::Duration;

use chrono::{DateTime, Local};
use speedsign_core::frame::decode_frame;
use speedsign_core::models::SpeedSample;
use tracing::{debug, trace};

use crate::collaborators::FrameSource;

/// Polls a [`FrameSource`] and keeps the current speed.
pub struct SensorReader {
    source: Box<dyn FrameSource>,
    timeout: Duration,
    current_speed: u32,
    frames_decoded: u64,
    frames_rejected: u64,
}

impl SensorReader {
    /// Create a reader that waits at most `timeout` per poll.
    pub fn new(source: Box<dyn FrameSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            current_speed: 0,
            frames_decoded: 0,
            frames_rejected: 0,
        }
    }

    /// Read one frame and return the sample it carried, if any.
    pub fn poll(&mut self, now: DateTime<Local>) -> Option<SpeedSample> {
        let bytes = match self.source.read_frame(self.timeout) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "sensor read failed; keeping previous speed");
                return None;
            }
        };

        match decode_frame(&bytes) {
            Some(value) => {
                self.frames_decoded += 1;
                self.current_speed = value;
                Some(SpeedSample {
                    value,
                    captured_at: now,
                })
            }
            None => {
                self.frames_rejected += 1;
                trace!(?bytes, "malformed frame dropped");
                None
            }
        }
    }

    /// Last decoded speed (0 before the first frame).
    pub fn current_speed(&self) -> u32 {
        self.current_speed
    }

    /// Frames decoded since start.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Frames dropped for a bad length or terminator.
    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }
}
