//! Server error types.

use thiserror::Error;

/// Errors surfaced while starting the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the TCP listener failed.
    #[error("failed to bind TCP listener at {host}:{port}: {source}")]
    Bind {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Reading back the bound address failed.
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}
