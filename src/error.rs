//! Error types
//!
//! Crate-level errors for configuration, I/O and persistence. Per-client
//! delivery failures live in [`crate::registry::DeliveryError`] and never
//! travel past the broadcaster.

use std::path::PathBuf;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying I/O failure (socket bind, serve loop)
    Io(std::io::Error),
    /// Invalid configuration value
    Config(String),
    /// The latency log could not be written
    Persistence {
        /// Log file that failed
        path: PathBuf,
        /// Records popped from the queue and lost with this batch
        lost: usize,
        /// Cause
        source: std::io::Error,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Persistence { path, lost, source } => write!(
                f,
                "Failed to write latency log {} ({} records lost): {}",
                path.display(),
                lost,
                source
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Persistence { source, .. } => Some(source),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
