use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the speed sign crates.
#[derive(Error, Debug)]
pub enum SignError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written or replaced on disk.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A policy value was rejected (zero limit, zero cooldown, ...).
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// The radar transport could not be opened or read.
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// A relay or capture side effect failed.
    #[error("Device error: {0}")]
    Device(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the speed sign crates.
pub type Result<T> = std::result::Result<T, SignError>;
