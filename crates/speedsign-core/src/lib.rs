//! Core types for the speed sign.
//!
//! Holds the data model shared by every other crate (policy, samples,
//! sessions, log entries), the radar frame codec, the error type, CLI
//! settings and the timestamp/naming helpers used for artifacts and logs.

pub mod error;
pub mod frame;
pub mod models;
pub mod settings;
pub mod time_utils;
