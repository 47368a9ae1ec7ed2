//! Vehicle command errors.

/// Reasons a `CMD` is refused. Each refusal leaves the vehicle untouched.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Caller is not an authenticated admin.
    #[error("caller is not an authenticated admin")]
    NotAuthorized,

    /// Battery below the command threshold.
    #[error("battery too low for commands: {battery}%")]
    BatteryLow {
        /// Battery level observed under the vehicle lock.
        battery: u8,
    },

    /// Already at top speed.
    #[error("speed limit reached")]
    SpeedLimit,

    /// Action name not recognised.
    #[error("unknown action: {0}")]
    UnknownCommand(String),
}

impl CommandError {
    /// Reason code used in `CMD-ERR ... reason=<code>`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "not_authorized",
            Self::BatteryLow { .. } => "battery_low",
            Self::SpeedLimit => "speed_limit",
            Self::UnknownCommand(_) => "unknown_command",
        }
    }
}
