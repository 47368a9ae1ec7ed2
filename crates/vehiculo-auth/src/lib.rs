//! # vehiculo-auth
//!
//! Administrator authentication for Vehiculo.
//!
//! - [`Credential`]: the single `username:salt:hexhash` record
//! - [`AuthRequest`]: the parsed argument of an `AUTH` line
//! - [`AuthManager`]: password verification, token issuing, token re-entry
//!
//! Token re-entry consults a [`TokenDirectory`] (the live session registry)
//! or the manager's own table of issued tokens, depending on
//! [`TokenPolicy`](vehiculo_settings::TokenPolicy).

#![deny(unsafe_code)]

pub mod credentials;
pub mod errors;
pub mod manager;

pub use credentials::{Credential, hash_password};
pub use errors::{AuthError, CredentialError};
pub use manager::{AuthManager, AuthRequest, TokenDirectory, generate_token};
