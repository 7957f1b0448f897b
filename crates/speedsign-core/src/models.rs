use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SignError};
use crate::time_utils::format_log_timestamp;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Speed limit used when nothing usable is persisted.
pub const DEFAULT_SPEED_LIMIT: u32 = 60;

/// Cooldown (session length and trigger spacing) used when nothing usable is
/// persisted.
pub const DEFAULT_COOLDOWN_SECS: u32 = 10;

/// Margin below the limit inside which samples are still logged.
pub const DEFAULT_NEAR_LIMIT_MARGIN: u32 = 10;

/// The `video` value of a log entry produced while no session was active.
///
/// External consumers match on this exact string.
pub const NO_SESSION_SENTINEL: &str = "Tidak diRecord/sedang cooldown";

// ── Timestamp ─────────────────────────────────────────────────────────────────

/// One reading of both clocks.
///
/// `wall` names sessions and stamps log lines. `monotonic` is the time since
/// a fixed origin and is what cooldowns and expiry are measured on, so a
/// wall-clock step (an NTP sync on a board without an RTC) can neither stretch
/// nor cut short a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub wall: DateTime<Local>,
    pub monotonic: Duration,
}

impl Timestamp {
    pub fn new(wall: DateTime<Local>, monotonic: Duration) -> Self {
        Self { wall, monotonic }
    }

    /// Monotonic time elapsed since `earlier`; zero if `earlier` is later.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.monotonic.saturating_sub(earlier.monotonic)
    }

    /// The instant `by` later on both clocks.
    pub fn advanced(&self, by: Duration) -> Self {
        let wall = chrono::Duration::from_std(by)
            .ok()
            .and_then(|d| self.wall.checked_add_signed(d))
            .unwrap_or(self.wall);
        Self {
            wall,
            monotonic: self.monotonic + by,
        }
    }
}

// ── SpeedSample ───────────────────────────────────────────────────────────────

/// One decoded radar reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSample {
    /// Speed in sensor units (km/h).
    pub value: u32,
    /// Wall-clock time the frame was decoded.
    pub captured_at: DateTime<Local>,
}

// ── Policy ────────────────────────────────────────────────────────────────────

/// Threshold and cooldown applied by the session manager.
///
/// Persisted as `{"speed_limit": 60, "record": 10}`; the `record` key holds
/// the cooldown in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Speeds at or above this value trigger a session.
    pub speed_limit: u32,
    /// Session length and minimum spacing between session starts, in seconds.
    #[serde(rename = "record")]
    pub cooldown_seconds: u32,
}

impl Policy {
    /// Build a policy, rejecting zero values.
    pub fn new(speed_limit: u32, cooldown_seconds: u32) -> Result<Self> {
        if speed_limit == 0 {
            return Err(SignError::InvalidPolicy(
                "speed_limit must be a positive integer".to_string(),
            ));
        }
        if cooldown_seconds == 0 {
            return Err(SignError::InvalidPolicy(
                "record (cooldown seconds) must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            speed_limit,
            cooldown_seconds,
        })
    }

    /// Cooldown as a duration.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(u64::from(self.cooldown_seconds))
    }

    /// `true` when `speed` reaches the limit.
    pub fn is_over_limit(&self, speed: u32) -> bool {
        speed >= self.speed_limit
    }

    /// `true` when `speed` lies in `[limit - margin, limit)`.
    pub fn is_near_limit(&self, speed: u32, margin: u32) -> bool {
        !self.is_over_limit(speed) && speed >= self.speed_limit.saturating_sub(margin)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            speed_limit: DEFAULT_SPEED_LIMIT,
            cooldown_seconds: DEFAULT_COOLDOWN_SECS,
        }
    }
}

/// Partial policy change submitted by an external surface.
///
/// Absent fields keep their persisted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit: Option<u32>,
    #[serde(default, rename = "record", skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<u32>,
}

impl PolicyUpdate {
    /// Apply this update on top of `base`, validating the result.
    pub fn apply_to(&self, base: Policy) -> Result<Policy> {
        Policy::new(
            self.speed_limit.unwrap_or(base.speed_limit),
            self.cooldown_seconds.unwrap_or(base.cooldown_seconds),
        )
    }
}

// ── RecordingSession ──────────────────────────────────────────────────────────

/// The single recording window currently (or most recently) in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    /// Identifier derived from the start time; also the artifact file name.
    pub session_id: String,
    /// When the triggering sample was seen.
    pub started_at: Timestamp,
    /// Last instant at which the session still counts as active.
    pub expires_at: Timestamp,
}

impl RecordingSession {
    /// Open a session at `started_at` lasting `cooldown`.
    pub fn new(session_id: String, started_at: Timestamp, cooldown: Duration) -> Self {
        Self {
            session_id,
            started_at,
            expires_at: started_at.advanced(cooldown),
        }
    }

    /// A session is active while `now <= expires_at`, on the monotonic clock.
    pub fn is_active_at(&self, now: &Timestamp) -> bool {
        now.monotonic <= self.expires_at.monotonic
    }

    /// Configured run length in whole seconds.
    pub fn duration_secs(&self) -> u64 {
        self.expires_at.since(&self.started_at).as_secs()
    }
}

// ── SessionRef ────────────────────────────────────────────────────────────────

/// What a log entry is associated with.
///
/// Serialises as a plain string: the session id, or [`NO_SESSION_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionRef {
    /// Produced while the named session was active.
    Session(String),
    /// Produced with no active session.
    NoSession,
}

impl SessionRef {
    /// The session id, or `None` for the sentinel.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionRef::Session(id) => Some(id),
            SessionRef::NoSession => None,
        }
    }

    /// The string stored in the `video` field.
    pub fn as_str(&self) -> &str {
        match self {
            SessionRef::Session(id) => id,
            SessionRef::NoSession => NO_SESSION_SENTINEL,
        }
    }
}

impl From<String> for SessionRef {
    fn from(s: String) -> Self {
        if s == NO_SESSION_SENTINEL {
            SessionRef::NoSession
        } else {
            SessionRef::Session(s)
        }
    }
}

impl From<SessionRef> for String {
    fn from(r: SessionRef) -> Self {
        match r {
            SessionRef::Session(id) => id,
            SessionRef::NoSession => NO_SESSION_SENTINEL.to_string(),
        }
    }
}

impl From<Option<&RecordingSession>> for SessionRef {
    fn from(session: Option<&RecordingSession>) -> Self {
        match session {
            Some(s) => SessionRef::Session(s.session_id.clone()),
            None => SessionRef::NoSession,
        }
    }
}

// ── LogEntry ──────────────────────────────────────────────────────────────────

/// One persisted speed record.
///
/// Wire shape: `{"timestamp": "2024-03-01 14:05:09", "speed": 72, "video": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local wall-clock time, formatted with `LOG_TIMESTAMP_FORMAT`.
    pub timestamp: String,
    /// Speed in sensor units.
    pub speed: u32,
    /// Associated session, or the sentinel.
    #[serde(rename = "video")]
    pub session_ref: SessionRef,
}

impl LogEntry {
    /// Build an entry stamped with `at`.
    pub fn new(at: DateTime<Local>, speed: u32, session_ref: SessionRef) -> Self {
        Self {
            timestamp: format_log_timestamp(at),
            speed,
            session_ref,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
