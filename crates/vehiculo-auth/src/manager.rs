//! `AUTH` request parsing and verification.

use std::collections::HashSet;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{info, warn};
use vehiculo_core::Token;
use vehiculo_settings::TokenPolicy;

use crate::credentials::Credential;
use crate::errors::AuthError;

/// Prefix selecting token re-authentication.
pub const TOKEN_PREFIX: &str = "token=";

/// Parsed argument of an `AUTH` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthRequest {
    /// `AUTH <user> <pass>`.
    Password {
        /// Claimed username.
        username: String,
        /// Plaintext password.
        password: String,
    },
    /// `AUTH token=<hex>`.
    Token(String),
}

impl AuthRequest {
    /// Parse everything after `AUTH `.
    ///
    /// Words beyond the password are ignored.
    pub fn parse(rest: &str) -> Result<Self, AuthError> {
        if rest.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if let Some(token) = rest.strip_prefix(TOKEN_PREFIX) {
            return Ok(Self::Token(token.to_string()));
        }
        let mut words = rest.split_whitespace();
        match (words.next(), words.next()) {
            (Some(username), Some(password)) => Ok(Self::Password {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(AuthError::BadFormat),
        }
    }
}

/// Lookup of tokens currently held by connected sessions.
pub trait TokenDirectory {
    /// Whether any registered session holds exactly `token`.
    fn holds_token(&self, token: &Token) -> bool;
}

/// Generate a fresh 128-bit admin token.
pub fn generate_token() -> Token {
    Token::from_bytes(rand::random())
}

/// Verifies passwords against the loaded credential and validates tokens.
pub struct AuthManager {
    credential: Option<Credential>,
    policy: TokenPolicy,
    issued: Mutex<HashSet<Token>>,
}

impl AuthManager {
    /// Create a manager. `None` disables password login.
    pub fn new(credential: Option<Credential>, policy: TokenPolicy) -> Self {
        Self {
            credential,
            policy,
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Load the credential record at `path`.
    ///
    /// A missing or malformed record is logged and leaves password login
    /// disabled; the server keeps running.
    pub fn load(path: &Path, policy: TokenPolicy) -> Self {
        let credential = match Credential::load(path) {
            Ok(credential) => {
                info!(username = %credential.username, "credentials loaded");
                Some(credential)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "admin login disabled; create a record formatted username:salt:hexsha256(salt+password)"
                );
                None
            }
        };
        Self::new(credential, policy)
    }

    /// Username of the loaded record.
    pub fn username(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.username.as_str())
    }

    /// Active token policy.
    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Verify `request` and return the token the session should hold.
    pub fn authenticate(
        &self,
        request: &AuthRequest,
        directory: &dyn TokenDirectory,
    ) -> Result<Token, AuthError> {
        match request {
            AuthRequest::Password { username, password } => {
                self.password_login(username, password)
            }
            AuthRequest::Token(token) => self.token_login(token, directory),
        }
    }

    /// Check `username`/`password` and issue a new token on success.
    pub fn password_login(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(AuthError::NoCredentialsOnServer)?;
        if username != credential.username {
            return Err(AuthError::InvalidUser(username.to_string()));
        }
        if !credential.verify(password) {
            return Err(AuthError::InvalidPassword);
        }
        let token = generate_token();
        let _ = self.issued.lock().insert(token.clone());
        Ok(token)
    }

    /// Validate a presented token under the configured policy.
    pub fn token_login(
        &self,
        token: &str,
        directory: &dyn TokenDirectory,
    ) -> Result<Token, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let token = Token::from_raw(token);
        let valid = match self.policy {
            TokenPolicy::LiveSession => directory.holds_token(&token),
            TokenPolicy::Issued => self.issued.lock().contains(&token),
        };
        if valid {
            Ok(token)
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}
