//! Logging setup errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening the log sink or installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be created or opened for append.
    #[error("failed to open log file {path}: {source}")]
    Io {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}
