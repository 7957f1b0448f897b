//! Shared, read-only view of what the sign is doing.
//!
//! Only the orchestration loop publishes; any number of readers (a status
//! API, the TUI) take cheap snapshots through a cloned [`StatusHandle`].

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use speedsign_core::models::Policy;

/// Point-in-time status of the sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub speed_limit: u32,
    pub cooldown_seconds: u32,
    /// Id (video name) of the active session.
    pub active_session_id: Option<String>,
    pub session_expires_at: Option<DateTime<Local>>,
    /// Last decoded speed.
    pub current_speed: u32,
    /// Sessions opened since start-up.
    pub sessions_started: usize,
    /// When the loop last published.
    pub updated_at: Option<DateTime<Local>>,
}

impl StatusSnapshot {
    /// Snapshot for a sign that has not run a cycle yet.
    pub fn initial(policy: Policy) -> Self {
        Self {
            speed_limit: policy.speed_limit,
            cooldown_seconds: policy.cooldown_seconds,
            active_session_id: None,
            session_expires_at: None,
            current_speed: 0,
            sessions_started: 0,
            updated_at: None,
        }
    }

    /// `true` while a session is active.
    pub fn is_recording(&self) -> bool {
        self.active_session_id.is_some()
    }

    /// JSON form for status consumers.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Cloneable handle to the shared status.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusHandle {
    /// Create a handle holding [`StatusSnapshot::initial`].
    pub fn new(policy: Policy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot::initial(policy))),
        }
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    /// Replace the status. Called by the orchestration loop only.
    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        *self.inner.write() = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot_reflects_policy() {
        let handle = StatusHandle::new(Policy::new(70, 12).unwrap());
        let snap = handle.snapshot();

        assert_eq!(snap.speed_limit, 70);
        assert_eq!(snap.cooldown_seconds, 12);
        assert!(!snap.is_recording());
        assert!(snap.updated_at.is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let writer = StatusHandle::new(Policy::default());
        let reader = writer.clone();

        let mut next = writer.snapshot();
        next.active_session_id = Some("SAM01_record_20240301_120000.mp4".to_string());
        next.current_speed = 72;
        writer.publish(next);

        let seen = reader.snapshot();
        assert!(seen.is_recording());
        assert_eq!(seen.current_speed, 72);
    }

    #[test]
    fn test_json_shape() {
        let json = StatusHandle::new(Policy::default()).snapshot().to_json();
        assert_eq!(json["speed_limit"], 60);
        assert_eq!(json["cooldown_seconds"], 10);
        assert!(json["active_session_id"].is_null());
    }
}
