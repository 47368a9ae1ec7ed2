//! The set of live sessions.
//!
//! One `parking_lot::Mutex` guards the whole map. A session's own state lock
//! may be taken while the registry lock is held; callers must never take the
//! registry lock while holding a session lock.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use vehiculo_auth::TokenDirectory;
use vehiculo_core::{Role, SessionId, Token};

use crate::session::Session;

/// Point-in-time view of one session for `LIST_USERS`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Registry key.
    pub id: SessionId,
    /// Remote address.
    pub peer: SocketAddr,
    /// Whether `AUTH` has succeeded.
    pub authenticated: bool,
    /// Current role label.
    pub role: Role,
}

impl fmt::Display for SessionSummary {
    /// `<ip:port>:<AUTH|NOAUTH>:<ROLE>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = if self.authenticated { "AUTH" } else { "NOAUTH" };
        write!(f, "{}:{auth}:{}", self.peer, self.role)
    }
}

/// Outcome of one [`SessionRegistry::for_each_authenticated`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions whose write succeeded.
    pub delivered: usize,
    /// Sessions removed because their write failed.
    pub removed: Vec<SessionId>,
}

/// Live sessions keyed by id, iterated in registration order.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session.
    pub fn add(&self, session: Arc<Session>) {
        let _ = self.sessions.lock().insert(session.id(), session);
    }

    /// Remove a session. Returns `false` if it was already gone.
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    /// Look up a session by id.
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// First registered session holding `token`, whatever its current role.
    pub fn find_by_token(&self, token: &Token) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .values()
            .find(|s| s.holds_token(token))
            .cloned()
    }

    /// Summaries of every session, taken in one critical section.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        self.sessions
            .lock()
            .values()
            .map(|s| {
                let state = s.state();
                SessionSummary {
                    id: s.id(),
                    peer: s.peer(),
                    authenticated: state.is_authenticated(),
                    role: state.role(),
                }
            })
            .collect()
    }

    /// Call `write` for every authenticated session.
    ///
    /// A session for which `write` returns `false` is removed and released in
    /// the same critical section, so no later pass can reach it.
    pub fn for_each_authenticated(
        &self,
        mut write: impl FnMut(&Session) -> bool,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        self.sessions.lock().retain(|id, session| {
            if !session.is_authenticated() {
                return true;
            }
            if write(session) {
                report.delivered += 1;
                true
            } else {
                debug!(session = %id, peer = %session.peer(), "write failed, removing session");
                session.release();
                report.removed.push(*id);
                false
            }
        });
        report
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl TokenDirectory for SessionRegistry {
    fn holds_token(&self, token: &Token) -> bool {
        self.find_by_token(token).is_some()
    }
}
