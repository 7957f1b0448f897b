//! One-shot commands that touch the persisted state and exit.

use anyhow::Context;
use speedsign_core::models::PolicyUpdate;
use speedsign_data::event_log::EventLog;
use speedsign_data::policy_store::PolicyStore;
use speedsign_runtime::status::StatusSnapshot;

/// Merge `update` into the stored policy. A running sign applies it on its
/// next reload.
pub fn update_policy(store: &PolicyStore, update: &PolicyUpdate) -> anyhow::Result<StatusSnapshot> {
    let policy = store
        .update(update)
        .with_context(|| format!("cannot update {}", store.path().display()))?;
    tracing::info!(
        speed_limit = policy.speed_limit,
        cooldown_seconds = policy.cooldown_seconds,
        "policy stored"
    );
    Ok(StatusSnapshot::initial(policy))
}

/// Status as seen from outside the sign loop: the stored policy and the
/// speed of the most recent log entry.
pub fn current_status(store: &PolicyStore, log: &EventLog) -> StatusSnapshot {
    let mut status = StatusSnapshot::initial(store.load());
    if let Some(last) = log.read_all().last() {
        status.current_speed = last.speed;
    }
    status
}
