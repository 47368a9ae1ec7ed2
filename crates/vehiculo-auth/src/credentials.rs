//! Credential record loading and salted password hashing.
//!
//! The record is the first line of a text file:
//!
//! ```text
//! username:salt:hex(sha256(salt ++ password))
//! ```

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::CredentialError;

/// The single administrator identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Login name.
    pub username: String,
    /// Salt prepended to the password before hashing.
    pub salt: String,
    /// Lowercase hex SHA-256 of `salt ++ password`.
    pub hash: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("salt", &"[REDACTED]")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Credential {
    /// Parse one `username:salt:hexhash` line. Trailing CR/LF is ignored.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.split(':');
        let username = parts.next().filter(|s| !s.is_empty())?;
        let salt = parts.next().filter(|s| !s.is_empty())?;
        let hash = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            username: username.to_string(),
            salt: salt.to_string(),
            hash: hash.to_string(),
        })
    }

    /// Load the record from the first line of `path`.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let first = content.lines().next().unwrap_or_default();
        Self::parse_line(first).ok_or_else(|| CredentialError::Malformed {
            path: path.to_path_buf(),
        })
    }

    /// Whether `password` hashes to the stored value.
    pub fn verify(&self, password: &str) -> bool {
        let computed = hash_password(&self.salt, password);
        constant_time_eq(computed.as_bytes(), self.hash.as_bytes())
    }
}

/// Lowercase hex SHA-256 of `salt ++ password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    use fmt::Write as _;

    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Constant-time comparison for auth validation.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
