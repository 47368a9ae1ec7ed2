//! Settings types with compiled defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehiculoSettings {
    /// Listener and per-connection limits.
    pub server: ServerSettings,
    /// Telemetry broadcast cadence.
    pub telemetry: TelemetrySettings,
    /// Credential record and token handling.
    pub auth: AuthSettings,
    /// Log sink and console output.
    pub logging: LoggingSettings,
}

impl VehiculoSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telemetry.interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "telemetry.intervalSecs must be > 0".into(),
            ));
        }
        if self.server.send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueue must be > 0".into(),
            ));
        }
        if self.server.max_line_length < MIN_LINE_LENGTH {
            return Err(SettingsError::InvalidValue(format!(
                "server.maxLineLength must be >= {MIN_LINE_LENGTH}"
            )));
        }
        Ok(())
    }
}

/// Smallest accepted `server.maxLineLength`.
pub const MIN_LINE_LENGTH: usize = 64;

/// Listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Longest accepted command line in bytes, excluding the terminator.
    pub max_line_length: usize,
    /// Outbound lines buffered per session before a write counts as failed.
    pub send_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_line_length: 2048,
            send_queue: 256,
        }
    }
}

/// Telemetry broadcaster settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySettings {
    /// Seconds between broadcast ticks.
    pub interval_secs: u64,
}

impl TelemetrySettings {
    /// Tick period.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

/// How `AUTH token=<hex>` is validated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// Valid while any connected session holds the token.
    #[default]
    LiveSession,
    /// Valid if this process issued it to the configured administrator,
    /// whether or not the issuing session is still connected.
    Issued,
}

impl TokenPolicy {
    /// Parse the `snake_case` name used in files and env vars.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "live_session" => Some(Self::LiveSession),
            "issued" => Some(Self::Issued),
            _ => None,
        }
    }
}

/// Authentication settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Path to the `username:salt:hash` record.
    pub credentials_path: PathBuf,
    /// Token validation policy.
    pub token_policy: TokenPolicy,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.txt"),
            token_policy: TokenPolicy::default(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Append-only log file receiving every wire line and lifecycle event.
    pub log_file: PathBuf,
    /// Default level filter; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON instead of human-readable console output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("vehiculo.log"),
            level: "info".to_string(),
            json: false,
        }
    }
}
