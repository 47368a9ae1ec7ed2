//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vehiculo_settings::VehiculoSettings;

/// Configuration for the Vehiculo server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Longest accepted command line in bytes.
    pub max_line_length: usize,
    /// Outbound lines buffered per session.
    pub send_queue: usize,
    /// Seconds between telemetry broadcasts.
    pub telemetry_interval_secs: u64,
}

impl ServerConfig {
    /// Telemetry period.
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_line_length: 2048,
            send_queue: 256,
            telemetry_interval_secs: 10,
        }
    }
}

impl From<&VehiculoSettings> for ServerConfig {
    fn from(settings: &VehiculoSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_line_length: settings.server.max_line_length,
            send_queue: settings.server.send_queue,
            telemetry_interval_secs: settings.telemetry.interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_line_length, 2048);
        assert_eq!(cfg.send_queue, 256);
        assert_eq!(cfg.telemetry_interval(), Duration::from_secs(10));
    }

    #[test]
    fn from_settings_copies_values() {
        let mut settings = VehiculoSettings::default();
        settings.server.port = 6000;
        settings.telemetry.interval_secs = 2;
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.telemetry_interval_secs, 2);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.send_queue, cfg.send_queue);
    }
}
