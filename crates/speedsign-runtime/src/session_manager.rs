//! Recording session state machine.
//!
//! [`SessionManager`] decides, one sample at a time, whether a recording
//! session starts, continues or ends. It holds at most one session. The
//! cooldown is both the session length and the minimum spacing between two
//! session starts, so a vehicle hovering around the limit produces exactly
//! one session until the window has run out.
//!
//! The manager is pure: it never touches the relay, the camera or the log.
//! The orchestrator acts on the [`Evaluation`] it returns. Elapsed time is
//! measured on the monotonic half of [`Timestamp`]; wall time only names
//! sessions.

use speedsign_core::models::{Policy, RecordingSession, SessionRef, Timestamp};
use speedsign_core::time_utils::session_name;
use tracing::info;

// ── Public types ──────────────────────────────────────────────────────────────

/// Where a speed sits relative to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedBand {
    /// At or above the limit.
    OverLimit,
    /// Within the near-limit margin below the limit.
    NearLimit,
    /// Further below.
    Below,
}

impl SpeedBand {
    /// Classify `speed` under `policy` with the given near-limit `margin`.
    pub fn classify(speed: u32, policy: &Policy, margin: u32) -> Self {
        if policy.is_over_limit(speed) {
            SpeedBand::OverLimit
        } else if policy.is_near_limit(speed, margin) {
            SpeedBand::NearLimit
        } else {
            SpeedBand::Below
        }
    }

    /// `true` for over- and near-limit speeds.
    pub fn is_loggable(&self) -> bool {
        !matches!(self, SpeedBand::Below)
    }
}

/// What the sample did to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// This sample opened a new session.
    Started(RecordingSession),
    /// A session is active; the sample belongs to it.
    Active { session_id: String, band: SpeedBand },
    /// No session is active and none was started.
    Idle { band: SpeedBand },
}

/// Result of [`SessionManager::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Session that ran out at this evaluation, before the sample was applied.
    pub expired: Option<RecordingSession>,
    pub outcome: Outcome,
}

impl Evaluation {
    /// The reference a log entry for this sample must carry.
    pub fn session_ref(&self) -> SessionRef {
        match &self.outcome {
            Outcome::Started(session) => SessionRef::Session(session.session_id.clone()),
            Outcome::Active { session_id, .. } => SessionRef::Session(session_id.clone()),
            Outcome::Idle { .. } => SessionRef::NoSession,
        }
    }
}

// ── SessionManager ────────────────────────────────────────────────────────────

/// Idle/Active state machine with a single session slot.
pub struct SessionManager {
    /// Prefix for session names.
    station_id: String,
    /// Near-limit margin below the speed limit.
    near_limit_margin: u32,
    /// The active session, if any.
    active: Option<RecordingSession>,
    /// Start time of the most recent session, active or not.
    last_start: Option<Timestamp>,
    /// Sessions opened since start-up.
    sessions_started: usize,
}

impl SessionManager {
    /// Create an idle manager.
    pub fn new(station_id: impl Into<String>, near_limit_margin: u32) -> Self {
        Self {
            station_id: station_id.into(),
            near_limit_margin,
            active: None,
            last_start: None,
            sessions_started: 0,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Apply one sample taken at `now`.
    ///
    /// Steps:
    /// 1. Expire the active session if `now` is past its expiry.
    /// 2. If a session is still active, the sample belongs to it; the expiry
    ///    is never extended and relay/capture are never re-armed.
    /// 3. Otherwise start a session when the speed reaches the limit and more
    ///    than one cooldown has passed since the previous start.
    pub fn evaluate(&mut self, now: Timestamp, speed: u32, policy: &Policy) -> Evaluation {
        let expired = self.expire_if_due(now);
        let band = SpeedBand::classify(speed, policy, self.near_limit_margin);

        let outcome = match &self.active {
            Some(session) => Outcome::Active {
                session_id: session.session_id.clone(),
                band,
            },
            None if band == SpeedBand::OverLimit && self.cooldown_elapsed(now, policy) => {
                Outcome::Started(self.start_session(now, speed, policy))
            }
            None => Outcome::Idle { band },
        };

        Evaluation { expired, outcome }
    }

    /// End the active session if `now` is past its expiry, returning it.
    pub fn expire_if_due(&mut self, now: Timestamp) -> Option<RecordingSession> {
        if self.active.as_ref().is_some_and(|s| !s.is_active_at(&now)) {
            let ended = self.active.take();
            if let Some(s) = &ended {
                info!(session_id = %s.session_id, "recording window finished");
            }
            return ended;
        }
        None
    }

    /// The active session. Call [`expire_if_due`](Self::expire_if_due) first
    /// when the answer must reflect the current time.
    pub fn active_session(&self) -> Option<&RecordingSession> {
        self.active.as_ref()
    }

    /// Reference for an entry produced right now.
    pub fn session_ref(&self) -> SessionRef {
        SessionRef::from(self.active.as_ref())
    }

    /// Sessions opened since start-up.
    pub fn sessions_started(&self) -> usize {
        self.sessions_started
    }

    /// Start time of the most recent session.
    pub fn last_start(&self) -> Option<Timestamp> {
        self.last_start
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn cooldown_elapsed(&self, now: Timestamp, policy: &Policy) -> bool {
        match &self.last_start {
            None => true,
            Some(start) => now.since(start) > policy.cooldown(),
        }
    }

    fn start_session(&mut self, now: Timestamp, speed: u32, policy: &Policy) -> RecordingSession {
        let session = RecordingSession::new(
            session_name(&self.station_id, now.wall),
            now,
            policy.cooldown(),
        );
        info!(
            session_id = %session.session_id,
            speed,
            speed_limit = policy.speed_limit,
            cooldown_seconds = policy.cooldown_seconds,
            "speed limit exceeded; recording started"
        );
        self.active = Some(session.clone());
        self.last_start = Some(now);
        self.sessions_started += 1;
        session
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::time::Duration;

    // ── helpers ───────────────────────────────────────────────────────────

    fn t(secs: u64) -> Timestamp {
        let wall = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Timestamp::new(wall, Duration::from_secs(500)).advanced(Duration::from_secs(secs))
    }

    fn policy() -> Policy {
        Policy::new(60, 10).unwrap()
    }

    fn manager() -> SessionManager {
        SessionManager::new("SAM01", 10)
    }

    fn started_id(eval: &Evaluation) -> String {
        match &eval.outcome {
            Outcome::Started(s) => s.session_id.clone(),
            other => panic!("expected Started, got {other:?}"),
        }
    }

    // ── reference scenario ────────────────────────────────────────────────

    #[test]
    fn test_reference_scenario() {
        let mut m = manager();

        let e0 = m.evaluate(t(0), 70, &policy());
        let s1 = started_id(&e0);
        assert_eq!(s1, "SAM01_record_20240301_120000.mp4");
        assert_eq!(m.active_session().unwrap().expires_at, t(10));

        let e5 = m.evaluate(t(5), 80, &policy());
        assert_eq!(e5.session_ref(), SessionRef::Session(s1.clone()));
        assert!(matches!(e5.outcome, Outcome::Active { band: SpeedBand::OverLimit, .. }));

        let e11 = m.evaluate(t(11), 80, &policy());
        let s2 = started_id(&e11);
        assert_ne!(s1, s2);
        assert_eq!(e11.expired.map(|s| s.session_id), Some(s1));
        assert_eq!(m.sessions_started(), 2);
    }

    // ── no overlap / no re-arm ────────────────────────────────────────────

    #[test]
    fn test_fluctuation_does_not_fragment_session() {
        let mut m = manager();
        m.evaluate(t(0), 65, &policy());

        for (secs, speed) in [(1, 40), (2, 70), (3, 59), (4, 90), (7, 20), (10, 61)] {
            let e = m.evaluate(t(secs), speed, &policy());
            assert!(
                matches!(e.outcome, Outcome::Active { .. }),
                "t={secs} speed={speed}: {e:?}"
            );
        }
        assert_eq!(m.sessions_started(), 1);
        assert_eq!(m.active_session().unwrap().expires_at, t(10));
    }

    #[test]
    fn test_at_most_one_session_for_any_sequence() {
        let mut m = manager();
        let speeds = [0u32, 61, 75, 30, 90, 90, 10, 62, 62, 0, 100, 59, 60, 61, 0, 0, 88];
        let mut last_start: Option<Timestamp> = None;

        for (i, speed) in speeds.iter().enumerate() {
            let now = t(i as u64 * 3);
            let e = m.evaluate(now, *speed, &policy());
            if let Outcome::Started(s) = &e.outcome {
                if let Some(prev) = last_start {
                    assert!(now.since(&prev) > Duration::from_secs(10), "overlapping start at {i}");
                }
                assert_eq!(m.active_session(), Some(s));
                last_start = Some(now);
            }
        }
    }

    // ── expiry boundary ───────────────────────────────────────────────────

    #[test]
    fn test_session_active_through_expiry_instant() {
        let mut m = manager();
        m.evaluate(t(0), 70, &policy());

        let at_expiry = m.evaluate(t(10), 70, &policy());
        assert!(matches!(at_expiry.outcome, Outcome::Active { .. }));
        assert!(at_expiry.expired.is_none());
    }

    #[test]
    fn test_expire_if_due_releases_once() {
        let mut m = manager();
        m.evaluate(t(0), 70, &policy());

        assert!(m.expire_if_due(t(10)).is_none());
        assert!(m.expire_if_due(t(11)).is_some());
        assert!(m.expire_if_due(t(12)).is_none());
        assert_eq!(m.session_ref(), SessionRef::NoSession);
    }

    #[test]
    fn test_expired_session_never_referenced() {
        let mut m = manager();
        m.evaluate(t(0), 70, &policy());

        let e = m.evaluate(t(11), 55, &policy());

        assert!(e.expired.is_some());
        assert_eq!(e.outcome, Outcome::Idle { band: SpeedBand::NearLimit });
        assert_eq!(e.session_ref(), SessionRef::NoSession);
    }

    // ── idle behaviour ────────────────────────────────────────────────────

    #[test]
    fn test_below_limit_never_starts() {
        let mut m = manager();
        let e = m.evaluate(t(0), 59, &policy());
        assert_eq!(e.outcome, Outcome::Idle { band: SpeedBand::NearLimit });

        let e = m.evaluate(t(1), 10, &policy());
        assert_eq!(e.outcome, Outcome::Idle { band: SpeedBand::Below });
        assert_eq!(m.sessions_started(), 0);
    }

    #[test]
    fn test_longer_cooldown_after_reload_delays_next_start() {
        let mut m = manager();
        m.evaluate(t(0), 70, &policy());

        // Policy reloaded mid-session with a 30 s cooldown.
        let longer = Policy::new(60, 30).unwrap();
        let e = m.evaluate(t(11), 70, &longer);
        assert!(e.expired.is_some(), "expiry fixed at session start");
        assert_eq!(e.outcome, Outcome::Idle { band: SpeedBand::OverLimit });

        let e = m.evaluate(t(31), 70, &longer);
        assert!(matches!(e.outcome, Outcome::Started(_)));
    }

    #[test]
    fn test_new_session_uses_current_cooldown() {
        let mut m = manager();
        let short = Policy::new(60, 3).unwrap();
        m.evaluate(t(0), 70, &short);

        assert_eq!(m.active_session().unwrap().expires_at, t(3));
        assert_eq!(m.last_start(), Some(t(0)));
    }

    // ── band classification ───────────────────────────────────────────────

    #[test]
    fn test_speed_band_classification() {
        let p = policy();
        assert_eq!(SpeedBand::classify(60, &p, 10), SpeedBand::OverLimit);
        assert_eq!(SpeedBand::classify(50, &p, 10), SpeedBand::NearLimit);
        assert_eq!(SpeedBand::classify(49, &p, 10), SpeedBand::Below);
        assert_eq!(SpeedBand::classify(59, &p, 0), SpeedBand::Below);
        assert!(SpeedBand::NearLimit.is_loggable());
        assert!(!SpeedBand::Below.is_loggable());
    }

    // ── clock steps ───────────────────────────────────────────────────────

    #[test]
    fn test_wall_clock_step_back_does_not_hold_session_open() {
        let mut m = manager();
        m.evaluate(t(0), 70, &policy());

        // NTP sync moves the wall clock back an hour; 11 s pass monotonically.
        let mut later = t(11);
        later.wall = later.wall - chrono::Duration::hours(1);

        let e = m.evaluate(later, 80, &policy());

        assert!(e.expired.is_some());
        let s2 = started_id(&e);
        assert_eq!(s2, "SAM01_record_20240301_110011.mp4");
    }

    #[test]
    fn test_wall_clock_jump_forward_does_not_end_session_early() {
        let mut m = manager();
        m.evaluate(t(0), 70, &policy());

        let mut later = t(4);
        later.wall = later.wall + chrono::Duration::days(1);

        let e = m.evaluate(later, 80, &policy());
        assert!(matches!(e.outcome, Outcome::Active { .. }));
        assert!(m.expire_if_due(later).is_none());
    }
}
