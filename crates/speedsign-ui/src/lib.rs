//! Terminal presentation for the speed sign.
//!
//! Provides themes, the console and full-screen sign displays that plug into
//! the runtime as [`Display`](speedsign_runtime::collaborators::Display)
//! implementations, and the session report view, all built on [`ratatui`]
//! and [`crossterm`].

pub mod app;
pub mod console;
pub mod report_view;
pub mod sign_view;
pub mod themes;

pub use speedsign_core as core;
