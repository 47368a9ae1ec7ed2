//! # vehiculo-server
//!
//! TCP line-protocol server for the shared vehicle.
//!
//! - Line framing with a per-line limit (`codec`)
//! - Command parsing and dispatch to auth, vehicle, and registry
//! - Session registry with ordered snapshots and authenticated fan-out
//! - Periodic telemetry broadcaster driving battery drain
//! - Shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod acceptor;
pub mod broadcaster;
pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod registry;
pub mod server;
pub mod session;

pub use broadcaster::{TelemetryBroadcaster, telemetry_line};
pub use config::ServerConfig;
pub use errors::ServerError;
pub use registry::{BroadcastReport, SessionRegistry, SessionSummary};
pub use server::VehiculoServer;
pub use session::Session;
