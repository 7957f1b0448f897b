//! Sign control loop.
//!
//! [`RecordingOrchestrator`] owns the sensor reader, the policy reloader and
//! the session manager, and drives the relay, camera, display and speed log
//! from their decisions. One [`step`](RecordingOrchestrator::step) is one
//! control cycle; [`start`](RecordingOrchestrator::start) runs cycles on a
//! blocking task until the returned handle asks it to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use speedsign_core::models::{
    LogEntry, Policy, RecordingSession, SessionRef, Timestamp, DEFAULT_NEAR_LIMIT_MARGIN,
};
use speedsign_core::settings::Settings;
use speedsign_data::event_log::EventLog;
use speedsign_data::policy_store::PolicyStore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::collaborators::{
    Clock, Display, FrameSource, NoCapture, NoDisplay, NoRelay, Relay, SystemClock, VideoCapture,
};
use crate::policy_reloader::{PolicyChange, PolicyReloader, DEFAULT_CONFIG_INTERVAL_SECS};
use crate::sensor::SensorReader;
use crate::session_manager::{Outcome, SessionManager};
use crate::status::{StatusHandle, StatusSnapshot};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Loop tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Prefix for session names.
    pub station_id: String,
    pub near_limit_margin: u32,
    /// Longest wait for one radar frame.
    pub read_timeout: Duration,
    /// Time between policy reloads.
    pub config_interval: Duration,
    /// Minimum spacing of non-triggering log entries.
    pub log_interval: Duration,
    /// Minimum duration of one cycle.
    pub cycle_budget: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            station_id: "SAM01".to_string(),
            near_limit_margin: DEFAULT_NEAR_LIMIT_MARGIN,
            read_timeout: Duration::from_millis(100),
            config_interval: Duration::from_secs(DEFAULT_CONFIG_INTERVAL_SECS),
            log_interval: Duration::from_secs(1),
            cycle_budget: Duration::from_millis(20),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            station_id: settings.station_id.clone(),
            near_limit_margin: settings.near_limit_margin,
            read_timeout: settings.read_timeout(),
            config_interval: settings.config_interval(),
            ..Self::default()
        }
    }
}

/// The devices the loop drives.
pub struct Collaborators {
    pub frames: Box<dyn FrameSource>,
    pub relay: Box<dyn Relay>,
    pub capture: Box<dyn VideoCapture>,
    pub display: Box<dyn Display>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Only a frame source; every other collaborator is a no-op.
    pub fn headless(frames: Box<dyn FrameSource>) -> Self {
        Self {
            frames,
            relay: Box::new(NoRelay),
            capture: Box::new(NoCapture),
            display: Box::new(NoDisplay),
            clock: Arc::new(SystemClock::new()),
        }
    }
}

// ── CycleReport ───────────────────────────────────────────────────────────────

/// What one control cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Speed the cycle acted on.
    pub speed: u32,
    /// `true` when a new frame was decoded this cycle.
    pub fresh_sample: bool,
    pub policy_change: Option<PolicyChange>,
    /// Session opened by this cycle.
    pub started: Option<String>,
    /// Sessions that ended during this cycle.
    pub expired: Vec<String>,
    /// Entry appended to the speed log.
    pub logged: Option<LogEntry>,
}

/// Totals returned when the loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub sessions_started: usize,
}

// ── RecordingOrchestrator ─────────────────────────────────────────────────────

pub struct RecordingOrchestrator {
    config: OrchestratorConfig,
    sensor: SensorReader,
    reloader: PolicyReloader,
    sessions: SessionManager,
    relay: Box<dyn Relay>,
    capture: Box<dyn VideoCapture>,
    display: Box<dyn Display>,
    clock: Arc<dyn Clock>,
    log: Arc<EventLog>,
    status: StatusHandle,
    last_log_at: Option<Timestamp>,
}

impl RecordingOrchestrator {
    /// Build the loop and perform the initial policy load.
    pub fn new(
        config: OrchestratorConfig,
        collaborators: Collaborators,
        store: Arc<PolicyStore>,
        log: Arc<EventLog>,
    ) -> Self {
        let Collaborators {
            frames,
            relay,
            capture,
            display,
            clock,
        } = collaborators;

        let mut reloader = PolicyReloader::new(store, config.config_interval);
        reloader.load_now(clock.now());
        let policy = reloader.current();
        info!(
            speed_limit = policy.speed_limit,
            cooldown_seconds = policy.cooldown_seconds,
            station = %config.station_id,
            "policy loaded"
        );

        Self {
            sensor: SensorReader::new(frames, config.read_timeout),
            sessions: SessionManager::new(config.station_id.clone(), config.near_limit_margin),
            status: StatusHandle::new(policy),
            reloader,
            relay,
            capture,
            display,
            clock,
            log,
            last_log_at: None,
            config,
        }
    }

    /// Read-only status handle for other tasks.
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Swap the display. Displays that show the status need the handle from
    /// [`status_handle`](Self::status_handle), which only exists once the
    /// orchestrator does.
    pub fn set_display(&mut self, display: Box<dyn Display>) {
        self.display = display;
    }

    /// The policy currently in effect.
    pub fn policy(&self) -> Policy {
        self.reloader.current()
    }

    /// Run one control cycle.
    pub fn step(&mut self) -> CycleReport {
        let now = self.clock.now();

        let fresh_sample = self.sensor.poll(now.wall).is_some();
        let speed = self.sensor.current_speed();

        let policy_change = self.reloader.poll(now);
        let policy = self.reloader.current();

        let evaluation = self.sessions.evaluate(now, speed, &policy);
        let mut expired = Vec::new();
        if let Some(session) = &evaluation.expired {
            self.release_relay();
            expired.push(session.session_id.clone());
        }

        let mut started = None;
        let logged = match &evaluation.outcome {
            Outcome::Started(session) => {
                self.engage_relay();
                self.start_capture(session);
                started = Some(session.session_id.clone());
                self.append(now, speed, evaluation.session_ref())
            }
            Outcome::Active { .. } => self.append_rate_limited(now, speed, evaluation.session_ref()),
            Outcome::Idle { band } if band.is_loggable() => {
                self.append_rate_limited(now, speed, SessionRef::NoSession)
            }
            Outcome::Idle { .. } => None,
        };

        // Displays that read the status must see this cycle's session.
        self.publish(now, speed, policy);
        self.display.render(speed, policy.is_over_limit(speed));

        let end = self.clock.now();
        if let Some(session) = self.sessions.expire_if_due(end) {
            self.release_relay();
            expired.push(session.session_id);
            self.publish(end, speed, policy);
        }

        CycleReport {
            speed,
            fresh_sample,
            policy_change,
            started,
            expired,
            logged,
        }
    }

    /// Run cycles on a blocking task until the handle stops it.
    pub fn start(self) -> OrchestratorHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let status = self.status.clone();
        let flag = Arc::clone(&stop);

        let handle = tokio::task::spawn_blocking(move || self.run(&flag));

        OrchestratorHandle {
            stop,
            status,
            handle,
        }
    }

    // ── Private implementation ────────────────────────────────────────────

    fn run(mut self, stop: &AtomicBool) -> RunSummary {
        info!(station = %self.config.station_id, "speed sign loop started");
        let mut cycles = 0u64;

        while !stop.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();
            self.step();
            cycles += 1;

            let elapsed = cycle_start.elapsed();
            if elapsed < self.config.cycle_budget {
                std::thread::sleep(self.config.cycle_budget - elapsed);
            }
        }

        self.release_relay();
        self.display.render(0, false);
        let summary = RunSummary {
            cycles,
            sessions_started: self.sessions.sessions_started(),
        };
        info!(cycles, sessions = summary.sessions_started, "speed sign loop stopped");
        summary
    }

    fn append_rate_limited(
        &mut self,
        now: Timestamp,
        speed: u32,
        session_ref: SessionRef,
    ) -> Option<LogEntry> {
        let due = match &self.last_log_at {
            None => true,
            Some(last) => now.since(last) >= self.config.log_interval,
        };
        if due {
            self.append(now, speed, session_ref)
        } else {
            None
        }
    }

    fn append(&mut self, now: Timestamp, speed: u32, session_ref: SessionRef) -> Option<LogEntry> {
        let entry = LogEntry::new(now.wall, speed, session_ref);
        match self.log.append(&entry) {
            Ok(_) => {
                self.last_log_at = Some(now);
                Some(entry)
            }
            Err(e) => {
                warn!(error = %e, speed, "failed to append speed log entry");
                None
            }
        }
    }

    fn engage_relay(&mut self) {
        if let Err(e) = self.relay.engage() {
            warn!(error = %e, "relay engage failed");
        }
    }

    fn release_relay(&mut self) {
        if let Err(e) = self.relay.release() {
            warn!(error = %e, "relay release failed");
        }
    }

    fn start_capture(&mut self, session: &RecordingSession) {
        let duration = session.duration_secs();
        match self.capture.start_capture(&session.session_id, duration) {
            Ok(()) => debug!(session_id = %session.session_id, duration, "capture started"),
            Err(e) => warn!(error = %e, session_id = %session.session_id, "capture failed to start"),
        }
    }

    fn publish(&self, now: Timestamp, speed: u32, policy: Policy) {
        let active = self.sessions.active_session();
        self.status.publish(StatusSnapshot {
            speed_limit: policy.speed_limit,
            cooldown_seconds: policy.cooldown_seconds,
            active_session_id: active.map(|s| s.session_id.clone()),
            session_expires_at: active.map(|s| s.expires_at.wall),
            current_speed: speed,
            sessions_started: self.sessions.sessions_started(),
            updated_at: Some(now.wall),
        });
    }
}

// ── OrchestratorHandle ────────────────────────────────────────────────────────

/// Handle to a running loop.
pub struct OrchestratorHandle {
    stop: Arc<AtomicBool>,
    status: StatusHandle,
    handle: JoinHandle<RunSummary>,
}

impl OrchestratorHandle {
    /// Ask the loop to stop after its current cycle.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for it to release the relay.
    pub async fn shutdown(self) -> Result<RunSummary, JoinError> {
        self.stop();
        self.handle.await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
