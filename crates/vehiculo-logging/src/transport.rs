//! Append-only file transport for `tracing` events.
//!
//! [`FileTransport`] implements [`tracing_subscriber::Layer`] and writes one
//! line per event:
//!
//! ```text
//! [2026-01-05T10:00:00Z] <- sess_3 AUTH admin hunter2
//! [2026-01-05T10:00:00Z] client connected session=sess_3 peer=127.0.0.1:50122
//! ```
//!
//! The timestamp is UTC with second precision. The event message comes first,
//! followed by its fields as `key=value` in declaration order. Every line is
//! flushed immediately so the file stays readable while the server runs.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::errors::LoggingError;

/// Configuration for the file transport.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Least severe level written to the file. Default: INFO.
    pub min_level: Level,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            min_level: Level::INFO,
        }
    }
}

/// `tracing` layer that appends timestamped lines to a log file.
pub struct FileTransport {
    inner: Arc<Mutex<BufWriter<File>>>,
    path: PathBuf,
    config: TransportConfig,
}

impl FileTransport {
    /// Open `path` for append, creating it and its parent directory if needed.
    pub fn open(path: &Path, config: TransportConfig) -> Result<Self, LoggingError> {
        let io_err = |source| LoggingError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::new(file))),
            path: path.to_path_buf(),
            config,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle for flushing from outside the subscriber.
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    fn write_line(&self, line: &str) {
        let mut writer = self.inner.lock();
        let _ = writeln!(writer, "{line}");
        let _ = writer.flush();
    }
}

/// Handle for flushing the transport on shutdown.
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl TransportHandle {
    /// Flush buffered bytes to disk.
    pub fn flush(&self) {
        let _ = self.inner.lock().flush();
    }
}

/// Visitor that collects the message and the remaining fields in order.
struct LineVisitor {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl LineVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: Vec::new(),
        }
    }

    fn render(self, timestamp: &str) -> String {
        let mut line = format!("[{timestamp}]");
        if let Some(message) = self.message {
            line.push(' ');
            line.push_str(&message);
        }
        for (name, value) in self.fields {
            let _ = write!(line, " {name}={value}");
        }
        line
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

/// Current UTC time in the log line format.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl<S> Layer<S> for FileTransport
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > self.config.min_level {
            return;
        }
        let mut visitor = LineVisitor::new();
        event.record(&mut visitor);
        self.write_line(&visitor.render(&timestamp_now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    fn with_transport(transport: FileTransport, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(transport);
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn config_defaults() {
        assert_eq!(TransportConfig::default().min_level, Level::INFO);
    }

    #[test]
    fn writes_message_with_timestamp_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let transport = FileTransport::open(&path, TransportConfig::default()).unwrap();

        with_transport(transport, || {
            tracing::info!(target: "vehiculo::wire", "<- sess_1 SUBSCRIBE ADMIN");
        });

        let content = read(&path);
        let line = content.lines().next().unwrap();
        assert!(line.starts_with('['));
        assert_eq!(&line[21..23], "] ");
        assert!(line.ends_with("<- sess_1 SUBSCRIBE ADMIN"));
    }

    #[test]
    fn appends_fields_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let transport = FileTransport::open(&path, TransportConfig::default()).unwrap();

        with_transport(transport, || {
            tracing::info!(session = "sess_2", peer = %"10.0.0.1:4000", "client connected");
        });

        let content = read(&path);
        assert!(content.contains("client connected session=sess_2 peer=10.0.0.1:4000"));
    }

    #[test]
    fn filters_below_min_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let transport = FileTransport::open(&path, TransportConfig::default()).unwrap();

        with_transport(transport, || {
            tracing::debug!("hidden");
            tracing::warn!("shown");
        });

        let content = read(&path);
        assert!(!content.contains("hidden"));
        assert!(content.contains("shown"));
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        std::fs::write(&path, "previous run\n").unwrap();
        let transport = FileTransport::open(&path, TransportConfig::default()).unwrap();

        with_transport(transport, || tracing::info!("server started"));

        let content = read(&path);
        assert!(content.starts_with("previous run\n"));
        assert!(content.contains("server started"));
    }

    #[test]
    fn creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/server.log");
        let transport = FileTransport::open(&path, TransportConfig::default()).unwrap();
        assert_eq!(transport.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn open_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileTransport::open(dir.path(), TransportConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, LoggingError::Io { .. }));
    }

    #[test]
    fn handle_flush_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let transport =
            FileTransport::open(&dir.path().join("a.log"), TransportConfig::default()).unwrap();
        let handle = transport.handle();
        handle.flush();
        handle.flush();
    }

    #[test]
    fn timestamp_format() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }
}
