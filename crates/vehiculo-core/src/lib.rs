//! # vehiculo-core
//!
//! Foundation types shared by every Vehiculo crate:
//!
//! - **IDs**: [`SessionId`] for live connections, [`Token`] for admin re-entry
//! - **Roles**: [`Role`] label and the per-connection [`SessionState`] machine
//! - **Vehicle**: [`Vehicle`], the mutex-guarded state machine behind `CMD`
//! - **Errors**: [`CommandError`] with wire-level reason codes

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod role;
pub mod vehicle;

pub use errors::CommandError;
pub use ids::{SessionId, Token};
pub use role::{Role, SessionState};
pub use vehicle::{Action, Compass, Vehicle, VehicleState};
