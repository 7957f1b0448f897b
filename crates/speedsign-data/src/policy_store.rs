//! Persisted speed-limit / cooldown policy.
//!
//! The policy lives in `config.json` as `{"speed_limit": 60, "record": 10}`.
//! Loading never fails: a missing file is created with defaults, missing or
//! unusable fields are filled in and written back, and a corrupt file is
//! overwritten. Every read and write holds the store mutex and an advisory
//! lock on `config.json.lock`, so policy edits from another process are
//! serialised with the sign's reloads. Writes are atomic renames.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use speedsign_core::error::{Result, SignError};
use speedsign_core::models::{Policy, PolicyUpdate, DEFAULT_COOLDOWN_SECS, DEFAULT_SPEED_LIMIT};
use tracing::{debug, info, warn};

use crate::fs_utils::{read_optional, with_file_lock, write_atomic};

const KEY_SPEED_LIMIT: &str = "speed_limit";
const KEY_COOLDOWN: &str = "record";

// ── LoadOutcome ───────────────────────────────────────────────────────────────

/// How a [`PolicyLoad`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The persisted document was complete and valid.
    Persisted,
    /// No document existed; defaults were written.
    Created,
    /// Some fields were missing or invalid; defaults filled them and the
    /// merged document was written back.
    Merged,
    /// The document was unreadable or corrupt and has been overwritten.
    Recovered,
}

/// Result of [`PolicyStore::load_detailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLoad {
    pub policy: Policy,
    pub outcome: LoadOutcome,
}

impl PolicyLoad {
    /// `true` when the value came from a readable document.
    pub fn is_from_store(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Persisted | LoadOutcome::Merged)
    }
}

// ── PolicyStore ───────────────────────────────────────────────────────────────

/// File-backed policy store.
pub struct PolicyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PolicyStore {
    /// Create a store backed by `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the current policy, creating or repairing the document as
    /// needed. Always yields a usable policy.
    pub fn load(&self) -> Policy {
        self.load_detailed().policy
    }

    /// Like [`load`](Self::load) but also reports how the value was obtained.
    pub fn load_detailed(&self) -> PolicyLoad {
        self.load_with_fallback(Policy::default())
    }

    /// Load, using `fallback` instead of the built-in defaults when the
    /// document is unreadable or corrupt.
    ///
    /// The periodic reloader passes its last-known-good policy here so that a
    /// corrupted file is repaired with the values already in effect.
    pub fn load_with_fallback(&self, fallback: Policy) -> PolicyLoad {
        let _guard = self.lock.lock();
        with_file_lock(&self.path, || self.load_unlocked(fallback)).unwrap_or_else(|e| {
            warn!(error = %e, "policy lock unavailable; loading unlocked");
            self.load_unlocked(fallback)
        })
    }

    /// Persist `policy`, replacing the whole document.
    pub fn save(&self, policy: &Policy) -> Result<()> {
        let _guard = self.lock.lock();
        with_file_lock(&self.path, || {
            self.write_document(&policy_document(policy, Map::new()))
        })?
    }

    /// Merge a partial update into the persisted policy and save it.
    ///
    /// Unknown keys already present in the document are kept. The running
    /// sign picks the change up on its next reload.
    pub fn update(&self, update: &PolicyUpdate) -> Result<Policy> {
        let _guard = self.lock.lock();

        let next = with_file_lock(&self.path, || {
            let current = self.load_unlocked(Policy::default()).policy;
            let next = update.apply_to(current)?;
            let extra = self.read_object().unwrap_or_default();
            self.write_document(&policy_document(&next, extra))?;
            Ok::<_, SignError>(next)
        })??;

        info!(
            speed_limit = next.speed_limit,
            cooldown_seconds = next.cooldown_seconds,
            "policy updated"
        );
        Ok(next)
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn load_unlocked(&self, fallback: Policy) -> PolicyLoad {
        let content = match read_optional(&self.path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(path = %self.path.display(), "no policy file; writing defaults");
                let policy = Policy::default();
                self.persist_best_effort(&policy_document(&policy, Map::new()));
                return PolicyLoad {
                    policy,
                    outcome: LoadOutcome::Created,
                };
            }
            Err(e) => {
                warn!(error = %e, "policy file unreadable; rewriting");
                return self.recover(fallback);
            }
        };

        let mut object = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(path = %self.path.display(), "policy file is not a JSON object; rewriting");
                return self.recover(fallback);
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "policy file is corrupt; rewriting");
                return self.recover(fallback);
            }
        };

        let mut merged = false;
        let speed_limit = resolve_field(&mut object, KEY_SPEED_LIMIT, DEFAULT_SPEED_LIMIT, &mut merged);
        let cooldown_seconds =
            resolve_field(&mut object, KEY_COOLDOWN, DEFAULT_COOLDOWN_SECS, &mut merged);

        let policy = Policy {
            speed_limit,
            cooldown_seconds,
        };

        if merged {
            info!(path = %self.path.display(), "policy file was incomplete; defaults filled in");
            self.persist_best_effort(&Value::Object(object));
            PolicyLoad {
                policy,
                outcome: LoadOutcome::Merged,
            }
        } else {
            PolicyLoad {
                policy,
                outcome: LoadOutcome::Persisted,
            }
        }
    }

    fn recover(&self, fallback: Policy) -> PolicyLoad {
        self.persist_best_effort(&policy_document(&fallback, Map::new()));
        PolicyLoad {
            policy: fallback,
            outcome: LoadOutcome::Recovered,
        }
    }

    fn read_object(&self) -> Option<Map<String, Value>> {
        let content = read_optional(&self.path).ok().flatten()?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn write_document(&self, document: &Value) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&self.path, json.as_bytes())
    }

    /// Write errors on the load path are logged, never propagated.
    fn persist_best_effort(&self, document: &Value) {
        if let Err(e) = self.write_document(document) {
            warn!(error = %e, "failed to persist policy file");
        }
    }
}

// ── Free helpers ──────────────────────────────────────────────────────────────

/// Read a positive integer field, accepting numeric strings. Missing or
/// unusable values are replaced by `default` in `object` and flag `merged`.
fn resolve_field(object: &mut Map<String, Value>, key: &str, default: u32, merged: &mut bool) -> u32 {
    let parsed = object.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    });

    match parsed {
        Some(n) if n > 0 && n <= u64::from(u32::MAX) => n as u32,
        _ => {
            if object.contains_key(key) {
                warn!(key, "policy field has an unusable value; using default");
            }
            object.insert(key.to_string(), Value::from(default));
            *merged = true;
            default
        }
    }
}

/// Build the persisted document for `policy`, keeping any `extra` keys.
fn policy_document(policy: &Policy, mut extra: Map<String, Value>) -> Value {
    extra.insert(KEY_SPEED_LIMIT.to_string(), Value::from(policy.speed_limit));
    extra.insert(KEY_COOLDOWN.to_string(), Value::from(policy.cooldown_seconds));
    Value::Object(extra)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
