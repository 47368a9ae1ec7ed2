//! Command line parsing.
//!
//! Keywords are case-sensitive. The first word ends at the first space, tab,
//! CR or LF; everything after that single delimiter is the argument text.

use vehiculo_core::{Action, Role};

/// A recognised client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `AUTH ...` with the raw argument text (possibly empty).
    Auth(String),
    /// `SUBSCRIBE <role>`.
    Subscribe(Role),
    /// `LIST_USERS`.
    ListUsers,
    /// `CMD <action>` with the action already normalized.
    Cmd(Action),
    /// `QUIT`.
    Quit,
}

/// A line that could not be turned into a [`Command`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Nothing but whitespace, or an over-long line.
    #[error("invalid line")]
    Invalid,
    /// `SUBSCRIBE` without a role.
    #[error("SUBSCRIBE without a role")]
    MissingRole,
    /// `CMD` without an action.
    #[error("CMD without an action")]
    MissingAction,
    /// First word is not a known keyword.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl ProtocolError {
    /// Reply line sent to the client.
    pub fn reply(&self) -> &'static str {
        match self {
            Self::Invalid => "ERR invalid",
            Self::MissingRole => "ERR missing role",
            Self::MissingAction => "ERR missing action",
            Self::UnknownCommand(_) => "ERR unknown_command",
        }
    }
}

fn is_delimiter(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

/// Split a line into its keyword and the text after the keyword's delimiter.
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches(is_delimiter);
    if line.is_empty() {
        return None;
    }
    // Delimiters are single-byte ASCII.
    match line.find(is_delimiter) {
        Some(at) => Some((&line[..at], &line[at + 1..])),
        None => Some((line, "")),
    }
}

impl Command {
    /// Parse one non-empty line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let (keyword, rest) = split_keyword(line).ok_or(ProtocolError::Invalid)?;
        match keyword {
            "AUTH" => Ok(Self::Auth(rest.to_string())),
            "SUBSCRIBE" => rest
                .split_whitespace()
                .next()
                .map(|role| Self::Subscribe(Role::from_subscription(role)))
                .ok_or(ProtocolError::MissingRole),
            "LIST_USERS" => Ok(Self::ListUsers),
            "CMD" if rest.is_empty() => Err(ProtocolError::MissingAction),
            "CMD" => Ok(Self::Cmd(Action::parse(rest))),
            "QUIT" => Ok(Self::Quit),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}
