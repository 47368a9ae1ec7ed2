//! One connected peer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vehiculo_core::{SessionId, SessionState, Token};

/// A connected peer: identity, authentication state, and outbound queue.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    state: Mutex<SessionState>,
    /// Send channel to the connection's write task.
    tx: mpsc::Sender<Arc<str>>,
    /// Cancelled when the session is removed; stops both read and write tasks.
    release: CancellationToken,
    /// Count of lines dropped because the queue was full or closed.
    dropped_lines: AtomicU64,
}

impl Session {
    /// Create a session in the `Connected` state.
    pub fn new(peer: SocketAddr, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id: SessionId::next(),
            peer,
            state: Mutex::new(SessionState::default()),
            tx,
            release: CancellationToken::new(),
            dropped_lines: AtomicU64::new(0),
        }
    }

    /// Registry key.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Copy of the current state.
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Mutate the state under its lock.
    pub fn update_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Whether `AUTH` has succeeded on this session.
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().is_authenticated()
    }

    /// Whether this session holds exactly `token`.
    pub fn holds_token(&self, token: &Token) -> bool {
        self.state.lock().token() == Some(token)
    }

    /// Queue one line for the peer.
    ///
    /// Returns `false` if the queue is full or closed; the line is dropped.
    pub fn send(&self, line: impl Into<Arc<str>>) -> bool {
        if self.tx.try_send(line.into()).is_ok() {
            true
        } else {
            let _ = self.dropped_lines.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total lines dropped for this session.
    pub fn drop_count(&self) -> u64 {
        self.dropped_lines.load(Ordering::Relaxed)
    }

    /// Signal the connection tasks to stop.
    pub fn release(&self) {
        self.release.cancel();
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.release.is_cancelled()
    }

    /// Token observed by the connection tasks.
    pub fn release_token(&self) -> CancellationToken {
        self.release.clone()
    }
}
