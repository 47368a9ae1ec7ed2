//! # vehiculo-settings
//!
//! Configuration for the Vehiculo server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`VehiculoSettings::default()`]
//! 2. **Settings file**: a JSON document deep-merged over the defaults
//! 3. **Environment variables**: `VEHICULO_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings_from_path};
pub use types::*;
