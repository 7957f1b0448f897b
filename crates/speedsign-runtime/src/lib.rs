//! Runtime orchestration layer for the speed sign.
//!
//! Runs the per-sample control cycle: reads the radar, keeps the policy
//! fresh, drives the recording session state machine, appends to the speed
//! log and fires the relay/capture/display side effects. Also owns the shared
//! status view and the delayed cleanup task.

pub mod cleanup;
pub mod collaborators;
pub mod orchestrator;
pub mod policy_reloader;
pub mod sensor;
pub mod session_manager;
pub mod status;

pub use speedsign_core as core;
pub use speedsign_data as data;
