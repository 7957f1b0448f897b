//! Interval-driven policy reloads with last-known-good fallback.
//!
//! Wraps [`PolicyStore`] the way a TTL cache wraps a fetch: the in-memory
//! policy stays authoritative between reloads, even if the file changes
//! out-of-band, and a reload that finds the file corrupt keeps the values
//! already in effect (and repairs the file with them).

use std::sync::Arc;
use std::time::Duration;

use speedsign_core::models::{Policy, Timestamp};
use speedsign_data::policy_store::{LoadOutcome, PolicyStore};
use tracing::{debug, info, warn};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default seconds between reloads.
pub const DEFAULT_CONFIG_INTERVAL_SECS: u64 = 30;

// ── PolicyChange ──────────────────────────────────────────────────────────────

/// A reload that changed at least one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyChange {
    pub previous: Policy,
    pub current: Policy,
}

// ── PolicyReloader ────────────────────────────────────────────────────────────

/// Periodically refreshes the policy from its store.
pub struct PolicyReloader {
    store: Arc<PolicyStore>,
    interval: Duration,
    current: Policy,
    last_reload: Option<Timestamp>,
    last_outcome: Option<LoadOutcome>,
}

impl PolicyReloader {
    /// Create a reloader holding the built-in defaults until the first load.
    pub fn new(store: Arc<PolicyStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            current: Policy::default(),
            last_reload: None,
            last_outcome: None,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Load unconditionally. Used once at start-up.
    pub fn load_now(&mut self, now: Timestamp) -> Option<PolicyChange> {
        self.reload(now)
    }

    /// Reload if at least one interval has passed since the last load.
    pub fn poll(&mut self, now: Timestamp) -> Option<PolicyChange> {
        if self.is_due(now) {
            self.reload(now)
        } else {
            None
        }
    }

    /// The policy currently in effect.
    pub fn current(&self) -> Policy {
        self.current
    }

    /// How the last reload obtained its value.
    pub fn last_outcome(&self) -> Option<LoadOutcome> {
        self.last_outcome
    }

    /// When the last reload happened.
    pub fn last_reload(&self) -> Option<Timestamp> {
        self.last_reload
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_due(&self, now: Timestamp) -> bool {
        match &self.last_reload {
            None => true,
            Some(ts) => now.since(ts) >= self.interval,
        }
    }

    fn reload(&mut self, now: Timestamp) -> Option<PolicyChange> {
        let load = self.store.load_with_fallback(self.current);
        self.last_reload = Some(now);
        self.last_outcome = Some(load.outcome);

        if load.outcome == LoadOutcome::Recovered {
            warn!(
                speed_limit = self.current.speed_limit,
                cooldown_seconds = self.current.cooldown_seconds,
                "policy file was corrupt; keeping last known good values"
            );
            return None;
        }

        debug!(outcome = ?load.outcome, "policy reloaded");
        if load.policy == self.current {
            return None;
        }

        let change = PolicyChange {
            previous: self.current,
            current: load.policy,
        };
        if change.previous.speed_limit != change.current.speed_limit {
            info!(
                from = change.previous.speed_limit,
                to = change.current.speed_limit,
                "speed limit changed"
            );
        }
        if change.previous.cooldown_seconds != change.current.cooldown_seconds {
            info!(
                from = change.previous.cooldown_seconds,
                to = change.current.cooldown_seconds,
                "cooldown changed"
            );
        }
        self.current = load.policy;
        Some(change)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
