//! Auth error types.

use std::path::PathBuf;

/// Reasons an `AUTH` request is refused.
///
/// The wire reason comes from [`AuthError::reason`]; `Display` is for logs.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// `AUTH` with nothing after it.
    #[error("no credentials supplied")]
    MissingCredentials,

    /// `token=` value is empty or not held by anyone.
    #[error("token not recognised")]
    InvalidToken,

    /// Username or password missing from `AUTH <user> <pass>`.
    #[error("expected AUTH <user> <pass>")]
    BadFormat,

    /// The server has no credential record loaded.
    #[error("no credential record loaded")]
    NoCredentialsOnServer,

    /// Username does not match the loaded record.
    #[error("unknown user: {0}")]
    InvalidUser(String),

    /// Password hash mismatch.
    #[error("password mismatch")]
    InvalidPassword,
}

impl AuthError {
    /// Reason code used in `AUTH-ERR reason=<code>`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidToken => "invalid_token",
            Self::BadFormat => "bad_format",
            Self::NoCredentialsOnServer => "no_credentials_on_server",
            Self::InvalidUser(_) => "invalid_user",
            Self::InvalidPassword => "invalid_password",
        }
    }
}

/// Errors loading the credential record.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// File missing, unreadable, or empty.
    #[error("failed to read credential file {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// First line is not `username:salt:hexhash`.
    #[error("malformed credential record in {path}: expected username:salt:hexhash")]
    Malformed {
        /// File that was read.
        path: PathBuf,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
