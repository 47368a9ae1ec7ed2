//! # vehiculo-agent
//!
//! Vehiculo server binary: loads settings, opens the log sink, reads the
//! admin credential, and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vehiculo_auth::AuthManager;
use vehiculo_logging::LoggingConfig;
use vehiculo_server::{ServerConfig, VehiculoServer};
use vehiculo_settings::VehiculoSettings;

/// Vehicle control and telemetry server.
#[derive(Parser, Debug)]
#[command(name = "vehiculo-server", about = "Vehicle control and telemetry server")]
struct Cli {
    /// TCP port to listen on.
    port: u16,

    /// Append-only log file.
    log_file: PathBuf,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Credential file holding `username:salt:hash` (overrides settings).
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// JSON settings file.
    #[arg(long, default_value = "vehiculo.json")]
    config: PathBuf,

    /// Seconds between telemetry broadcasts (overrides settings).
    #[arg(long)]
    telemetry_interval: Option<u64>,
}

impl Cli {
    /// Apply command-line values over loaded settings. CLI values win.
    fn apply(&self, settings: &mut VehiculoSettings) {
        settings.server.port = self.port;
        settings.logging.log_file.clone_from(&self.log_file);
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(path) = &self.credentials {
            settings.auth.credentials_path.clone_from(path);
        }
        if let Some(secs) = self.telemetry_interval {
            settings.telemetry.interval_secs = secs;
        }
    }
}

fn logging_config(settings: &VehiculoSettings) -> LoggingConfig {
    LoggingConfig {
        level: settings.logging.level.clone(),
        json: settings.logging.json,
        log_file: Some(settings.logging.log_file.clone()),
    }
}

fn load_settings(args: &Cli) -> Result<VehiculoSettings> {
    let mut settings = vehiculo_settings::load_settings_from_path(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load_settings(&args)?;

    let log_guard = vehiculo_logging::init_logging(&logging_config(&settings))
        .context("Failed to open log sink")?;

    let auth = AuthManager::load(&settings.auth.credentials_path, settings.auth.token_policy);
    let server = VehiculoServer::new(ServerConfig::from(&settings), auth);

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        %addr,
        telemetry_interval_secs = settings.telemetry.interval_secs,
        token_policy = ?settings.auth.token_policy,
        "Vehiculo server started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown(handle).await;

    tracing::info!("Shutdown complete");
    log_guard.flush();
    Ok(())
}
