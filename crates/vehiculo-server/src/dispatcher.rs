//! Routes decoded frames to the auth manager, the vehicle, or the registry.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use vehiculo_auth::{AuthManager, AuthRequest};
use vehiculo_core::{Action, Role, Vehicle};

use crate::codec::Inbound;
use crate::command::{Command, ProtocolError};
use crate::registry::SessionRegistry;
use crate::session::Session;

/// What the connection worker does after sending the replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Stop reading and close once the replies are flushed.
    Close,
}

/// Replies for one inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Lines to send, in order.
    pub lines: Vec<String>,
    /// Whether the session continues.
    pub flow: Flow,
}

impl Outcome {
    fn reply(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            flow: Flow::Continue,
        }
    }

    fn silent() -> Self {
        Self {
            lines: Vec::new(),
            flow: Flow::Continue,
        }
    }
}

/// Shared command handler; one per server.
pub struct Dispatcher {
    vehicle: Arc<Vehicle>,
    registry: Arc<SessionRegistry>,
    auth: Arc<AuthManager>,
}

impl Dispatcher {
    /// Create a dispatcher over the shared services.
    pub fn new(
        vehicle: Arc<Vehicle>,
        registry: Arc<SessionRegistry>,
        auth: Arc<AuthManager>,
    ) -> Self {
        Self {
            vehicle,
            registry,
            auth,
        }
    }

    /// Handle one frame from `session`.
    ///
    /// Empty lines produce no reply.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub fn process(&self, session: &Session, frame: &Inbound) -> Outcome {
        let line = match frame {
            Inbound::Oversized => return Outcome::reply(ProtocolError::Invalid.reply()),
            Inbound::Line(line) if line.is_empty() => return Outcome::silent(),
            Inbound::Line(line) => line,
        };
        match Command::parse(line) {
            Ok(command) => self.execute(session, command),
            Err(e) => {
                debug!(error = %e, "protocol error");
                Outcome::reply(e.reply())
            }
        }
    }

    fn execute(&self, session: &Session, command: Command) -> Outcome {
        match command {
            Command::Auth(rest) => Outcome::reply(self.auth(session, &rest)),
            Command::Subscribe(role) => Outcome::reply(subscribe(session, role)),
            Command::ListUsers => self.list_users(session),
            Command::Cmd(action) => Outcome::reply(self.command(session, &action)),
            Command::Quit => Outcome {
                lines: vec!["BYE".into()],
                flow: Flow::Close,
            },
        }
    }

    fn auth(&self, session: &Session, rest: &str) -> String {
        let result = AuthRequest::parse(rest)
            .and_then(|request| self.auth.authenticate(&request, self.registry.as_ref()));
        match result {
            Ok(token) => {
                let reply = format!("AUTH-OK token={token}");
                session.update_state(|state| state.authenticate(token));
                info!(peer = %session.peer(), "admin authenticated");
                reply
            }
            Err(e) => {
                info!(peer = %session.peer(), reason = e.reason(), "authentication refused");
                format!("AUTH-ERR reason={}", e.reason())
            }
        }
    }

    fn list_users(&self, session: &Session) -> Outcome {
        if !session.state().is_admin() {
            return Outcome::reply("ERR not_authorized");
        }
        let sessions = self.registry.snapshot();
        let mut lines = Vec::with_capacity(sessions.len() + 1);
        lines.push(format!("USERS {}", sessions.len()));
        lines.extend(sessions.iter().map(ToString::to_string));
        Outcome {
            lines,
            flow: Flow::Continue,
        }
    }

    fn command(&self, session: &Session, action: &Action) -> String {
        let caller = session.state();
        match self.vehicle.execute(&caller, action) {
            Ok(state) => {
                info!(
                    action = %action,
                    speed = state.speed,
                    battery = state.battery,
                    heading = state.heading,
                    "command executed"
                );
                format!("CMD-ACK action={action} status=OK")
            }
            Err(e) => {
                debug!(action = %action, reason = e.reason(), "command refused");
                format!("CMD-ERR action={action} reason={}", e.reason())
            }
        }
    }
}

fn subscribe(session: &Session, role: Role) -> String {
    session.update_state(|state| state.subscribe(role));
    format!("SUBSCRIBE-OK role={role}")
}
