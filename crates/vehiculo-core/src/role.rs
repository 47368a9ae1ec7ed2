//! Session roles and the per-connection authentication state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::Token;

/// Role label of a session as it appears on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// No `SUBSCRIBE` or `AUTH` seen yet.
    #[default]
    None,
    /// Passive telemetry consumer.
    Observer,
    /// Vehicle operator.
    Admin,
}

impl Role {
    /// Parse the argument of `SUBSCRIBE`.
    ///
    /// Case-insensitive. Anything that is not `ADMIN` selects `OBSERVER`,
    /// so the result is never [`Role::None`].
    pub fn from_subscription(arg: &str) -> Self {
        if arg.eq_ignore_ascii_case("ADMIN") {
            Self::Admin
        } else {
            Self::Observer
        }
    }

    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Observer => "OBSERVER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication state of one session.
///
/// ```text
/// Connected ──SUBSCRIBE──▶ Subscribed(role)
///     │                        │
///     └──────AUTH ok──────┬────┘
///                         ▼
///              Authenticated(ADMIN, token) ──SUBSCRIBE──▶ Authenticated(role, token)
/// ```
///
/// Authentication without a token, or a subscribed session without a role,
/// cannot be represented.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Freshly accepted; role `NONE`, unauthenticated.
    #[default]
    Connected,
    /// Role chosen via `SUBSCRIBE`, still unauthenticated.
    Subscribed(Role),
    /// Credentials or a token were accepted.
    Authenticated {
        /// Current role label.
        role: Role,
        /// Token issued to or adopted by this session.
        token: Token,
    },
}

impl SessionState {
    /// Role label for listings.
    pub fn role(&self) -> Role {
        match self {
            Self::Connected => Role::None,
            Self::Subscribed(role) | Self::Authenticated { role, .. } => *role,
        }
    }

    /// Whether `AUTH` has succeeded on this session.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Authenticated and currently labelled `ADMIN`.
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Authenticated {
                role: Role::Admin,
                ..
            }
        )
    }

    /// Token held by the session, if any.
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Apply `SUBSCRIBE`: relabel without touching authentication.
    pub fn subscribe(&mut self, requested: Role) {
        match self {
            Self::Authenticated { role, .. } => {
                if requested != Role::None {
                    *role = requested;
                }
            }
            _ => {
                *self = match requested {
                    Role::None => Self::Connected,
                    role => Self::Subscribed(role),
                };
            }
        }
    }

    /// Apply a successful `AUTH`: always grants `ADMIN`.
    pub fn authenticate(&mut self, token: Token) {
        *self = Self::Authenticated {
            role: Role::Admin,
            token,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Token {
        Token::from_raw("00112233445566778899aabbccddeeff")
    }

    #[test]
    fn subscription_parsing_is_case_insensitive() {
        assert_eq!(Role::from_subscription("ADMIN"), Role::Admin);
        assert_eq!(Role::from_subscription("admin"), Role::Admin);
        assert_eq!(Role::from_subscription("AdMiN"), Role::Admin);
        assert_eq!(Role::from_subscription("observer"), Role::Observer);
        assert_eq!(Role::from_subscription("anything"), Role::Observer);
    }

    #[test]
    fn role_labels() {
        assert_eq!(Role::None.to_string(), "NONE");
        assert_eq!(Role::Observer.to_string(), "OBSERVER");
        assert_eq!(Role::Admin.to_string(), "ADMIN");
    }

    #[test]
    fn new_state_is_connected() {
        let state = SessionState::default();
        assert_eq!(state.role(), Role::None);
        assert!(!state.is_authenticated());
        assert!(!state.is_admin());
        assert!(state.token().is_none());
    }

    #[test]
    fn subscribe_admin_does_not_authenticate() {
        let mut state = SessionState::default();
        state.subscribe(Role::Admin);
        assert_eq!(state, SessionState::Subscribed(Role::Admin));
        assert!(!state.is_authenticated());
        assert!(!state.is_admin());
    }

    #[test]
    fn resubscribe_changes_label() {
        let mut state = SessionState::default();
        state.subscribe(Role::Admin);
        state.subscribe(Role::Observer);
        assert_eq!(state.role(), Role::Observer);
    }

    #[test]
    fn authenticate_grants_admin() {
        let mut state = SessionState::Subscribed(Role::Observer);
        state.authenticate(token());
        assert!(state.is_authenticated());
        assert!(state.is_admin());
        assert_eq!(state.token(), Some(&token()));
    }

    #[test]
    fn subscribe_after_auth_keeps_authentication() {
        let mut state = SessionState::default();
        state.authenticate(token());
        state.subscribe(Role::Observer);
        assert!(state.is_authenticated());
        assert!(!state.is_admin());
        assert_eq!(state.role(), Role::Observer);
        assert_eq!(state.token(), Some(&token()));
    }

    #[test]
    fn subscribe_none_never_produces_labelless_subscription() {
        let mut state = SessionState::Subscribed(Role::Observer);
        state.subscribe(Role::None);
        assert_eq!(state, SessionState::Connected);

        let mut authed = SessionState::default();
        authed.authenticate(token());
        authed.subscribe(Role::None);
        assert_eq!(authed.role(), Role::Admin);
    }

    #[test]
    fn role_serde_uses_wire_labels() {
        let json = serde_json::to_string(&Role::Observer).unwrap();
        assert_eq!(json, "\"OBSERVER\"");
    }
}
