//! `VehiculoServer`: TCP listener plus telemetry broadcaster.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vehiculo_auth::AuthManager;
use vehiculo_core::Vehicle;

use crate::acceptor::run_accept_loop;
use crate::broadcaster::TelemetryBroadcaster;
use crate::config::ServerConfig;
use crate::connection::ConnectionContext;
use crate::dispatcher::Dispatcher;
use crate::errors::ServerError;
use crate::registry::SessionRegistry;

/// How long `shutdown` waits for the acceptor and broadcaster to wind down.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The vehicle server and its shared services.
pub struct VehiculoServer {
    config: ServerConfig,
    vehicle: Arc<Vehicle>,
    registry: Arc<SessionRegistry>,
    auth: Arc<AuthManager>,
    broadcaster: Arc<TelemetryBroadcaster>,
    stop: CancellationToken,
}

impl VehiculoServer {
    /// Create a server with a fresh vehicle and an empty registry.
    pub fn new(config: ServerConfig, auth: AuthManager) -> Self {
        Self::with_vehicle(config, auth, Vehicle::new())
    }

    /// Create a server around an existing vehicle.
    pub fn with_vehicle(config: ServerConfig, auth: AuthManager, vehicle: Vehicle) -> Self {
        let vehicle = Arc::new(vehicle);
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = Arc::new(TelemetryBroadcaster::new(
            Arc::clone(&vehicle),
            Arc::clone(&registry),
            config.telemetry_interval(),
        ));
        Self {
            config,
            vehicle,
            registry,
            auth: Arc::new(auth),
            broadcaster,
            stop: CancellationToken::new(),
        }
    }

    /// Bind the listener and start serving.
    ///
    /// Returns the bound address and a handle that completes once `stop`
    /// has ended the acceptor and the broadcaster. Connected sessions are
    /// left to finish on their own.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| ServerError::Bind {
                host: self.config.host.clone(),
                port: self.config.port,
                source,
            })?;
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let ctx = Arc::new(ConnectionContext {
            max_line_length: self.config.max_line_length,
            send_queue: self.config.send_queue,
            registry: Arc::clone(&self.registry),
            dispatcher: Arc::new(Dispatcher::new(
                Arc::clone(&self.vehicle),
                Arc::clone(&self.registry),
                Arc::clone(&self.auth),
            )),
        });

        let token = self.stop.clone();
        let broadcaster = Arc::clone(&self.broadcaster);
        let handle = tokio::spawn(async move {
            let telemetry = broadcaster.spawn(token.clone());
            run_accept_loop(listener, ctx, token).await;
            let _ = telemetry.await;
        });

        info!(%addr, "vehicle server listening");
        Ok((addr, handle))
    }

    /// Get the vehicle.
    pub fn vehicle(&self) -> &Arc<Vehicle> {
        &self.vehicle
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the auth manager.
    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Get the telemetry broadcaster.
    pub fn broadcaster(&self) -> &Arc<TelemetryBroadcaster> {
        &self.broadcaster
    }

    /// Stop accepting clients and stop telemetry. Safe to call from `Drop`.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            info!("vehicle server stopping");
        }
        self.stop.cancel();
    }

    /// Whether `stop` has been called.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Stop, then wait up to `SHUTDOWN_TIMEOUT` for the `listen` task.
    pub async fn shutdown(&self, handle: JoinHandle<()>) {
        self.stop();
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(())) => info!("vehicle server stopped"),
            Ok(Err(e)) => warn!(error = %e, "server task failed during shutdown"),
            Err(_) => warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "server task did not stop in time"
            ),
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
