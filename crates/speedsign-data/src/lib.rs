//! Persistence layer for the speed sign.
//!
//! Owns the two files the sign keeps on disk (the policy JSON and the speed
//! log JSON array), the atomic write helper both rely on, and the report that
//! joins log entries with the recorded videos.

pub mod event_log;
pub mod fs_utils;
pub mod policy_store;
pub mod report;

pub use speedsign_core as core;
