//! # vehiculo-logging
//!
//! Structured logging with `tracing`, written to the console and to an
//! append-only log file.
//!
//! Console output honours `RUST_LOG` (falling back to the configured level).
//! The file receives every INFO+ event regardless of the console filter, so
//! wire traffic (target [`WIRE_TARGET`]) always reaches it.

#![deny(unsafe_code)]

pub mod errors;
pub mod transport;

use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use errors::LoggingError;
pub use transport::{FileTransport, TransportConfig, TransportHandle, timestamp_now};

/// Target used for inbound and outbound protocol lines.
pub const WIRE_TARGET: &str = "vehiculo::wire";

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default console filter directive, e.g. `info` or `vehiculo_server=debug`.
    pub level: String,
    /// Emit JSON instead of human-readable console output.
    pub json: bool,
    /// Append-only log file. `None` disables the file sink.
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_file: None,
        }
    }
}

/// Keeps the file sink reachable for a final flush.
#[must_use = "dropping the guard flushes the log file"]
pub struct LoggingGuard {
    file: Option<TransportHandle>,
}

impl LoggingGuard {
    /// Flush the log file, if one is open.
    pub fn flush(&self) {
        if let Some(handle) = &self.file {
            handle.flush();
        }
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Console filter: `RUST_LOG` wins, otherwise the configured directive.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Call once at startup.
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let file = config
        .log_file
        .as_deref()
        .map(|path| FileTransport::open(path, TransportConfig::default()))
        .transpose()?;
    let handle = file.as_ref().map(FileTransport::handle);

    let (json_layer, text_layer) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(env_filter(&config.level));
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter(&config.level));
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(file.map(|transport| transport.with_filter(LevelFilter::INFO)))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { file: handle })
}
