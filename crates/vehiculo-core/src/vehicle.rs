//! The simulated vehicle and its command state machine.
//!
//! [`Vehicle`] owns the only copy of [`VehicleState`]. Every mutation goes
//! through one `parking_lot::Mutex` acquisition that covers the
//! authorization check, the battery check, the action guard and the write,
//! so two concurrent commands can never both pass a guard on a stale read.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::errors::CommandError;
use crate::role::SessionState;

/// Top speed.
pub const MAX_SPEED: f64 = 30.0;
/// Speed change per `SPEED_UP` / `SLOW_DOWN`.
pub const SPEED_STEP: f64 = 2.5;
/// Commands are refused below this battery level.
pub const MIN_COMMAND_BATTERY: u8 = 10;
/// Full charge.
pub const FULL_BATTERY: u8 = 100;

/// Point-in-time telemetry reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VehicleState {
    /// Speed, always within `[0, MAX_SPEED]`.
    pub speed: f64,
    /// Battery percentage, always within `[0, 100]`.
    pub battery: u8,
    /// Heading in degrees, always within `[0, 360)`.
    pub heading: u16,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            speed: 0.0,
            battery: FULL_BATTERY,
            heading: 0,
        }
    }
}

impl VehicleState {
    /// Compass label for the current heading.
    pub fn compass(&self) -> Compass {
        Compass::from_degrees(self.heading)
    }
}

/// Four-point compass label used in telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compass {
    /// `[315, 360) ∪ [0, 45)`
    N,
    /// `[45, 135)`
    E,
    /// `[135, 225)`
    S,
    /// `[225, 315)`
    W,
}

impl Compass {
    /// Classify a heading in degrees. Values above 359 wrap.
    pub fn from_degrees(degrees: u16) -> Self {
        match degrees % 360 {
            45..=134 => Self::E,
            135..=224 => Self::S,
            225..=314 => Self::W,
            _ => Self::N,
        }
    }

    /// Single-letter label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::E => "E",
            Self::S => "S",
            Self::W => "W",
        }
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `CMD` action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// `SPEED_UP`
    SpeedUp,
    /// `SLOW_DOWN`
    SlowDown,
    /// `TURN_LEFT`
    TurnLeft,
    /// `TURN_RIGHT`
    TurnRight,
    /// Anything else, already normalized.
    Unknown(String),
}

impl Action {
    /// Parse the text after `CMD `.
    ///
    /// Each space becomes `_` and ASCII letters are upper-cased, so
    /// `speed up` and `SPEED UP` both name `SPEED_UP`.
    pub fn parse(raw: &str) -> Self {
        let name: String = raw
            .chars()
            .map(|ch| if ch == ' ' { '_' } else { ch.to_ascii_uppercase() })
            .collect();
        match name.as_str() {
            "SPEED_UP" => Self::SpeedUp,
            "SLOW_DOWN" => Self::SlowDown,
            "TURN_LEFT" => Self::TurnLeft,
            "TURN_RIGHT" => Self::TurnRight,
            _ => Self::Unknown(name),
        }
    }

    /// Normalized action name echoed in `CMD-ACK` / `CMD-ERR`.
    pub fn name(&self) -> &str {
        match self {
            Self::SpeedUp => "SPEED_UP",
            Self::SlowDown => "SLOW_DOWN",
            Self::TurnLeft => "TURN_LEFT",
            Self::TurnRight => "TURN_RIGHT",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared vehicle, one per server.
#[derive(Debug, Default)]
pub struct Vehicle {
    state: Mutex<VehicleState>,
}

impl Vehicle {
    /// Create a vehicle at rest, fully charged, heading north.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vehicle from an explicit starting state.
    ///
    /// Out-of-range values are clamped so the invariants hold from the start.
    pub fn with_state(initial: VehicleState) -> Self {
        let state = VehicleState {
            speed: initial.speed.clamp(0.0, MAX_SPEED),
            battery: initial.battery.min(FULL_BATTERY),
            heading: initial.heading % 360,
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> VehicleState {
        *self.state.lock()
    }

    /// Run a command on behalf of `caller`.
    ///
    /// Checks run in a fixed order under the lock: authorization, battery,
    /// then the action's own guard. Returns the state after the mutation.
    pub fn execute(
        &self,
        caller: &SessionState,
        action: &Action,
    ) -> Result<VehicleState, CommandError> {
        let mut state = self.state.lock();

        if !caller.is_admin() {
            return Err(CommandError::NotAuthorized);
        }
        if state.battery < MIN_COMMAND_BATTERY {
            debug!(battery = state.battery, action = %action, "command refused on low battery");
            return Err(CommandError::BatteryLow {
                battery: state.battery,
            });
        }

        match action {
            Action::SpeedUp => {
                if state.speed >= MAX_SPEED {
                    return Err(CommandError::SpeedLimit);
                }
                state.speed = (state.speed + SPEED_STEP).min(MAX_SPEED);
            }
            Action::SlowDown => {
                state.speed = if state.speed <= 0.0 {
                    0.0
                } else {
                    (state.speed - SPEED_STEP).max(0.0)
                };
            }
            Action::TurnLeft => state.heading = (state.heading + 270) % 360,
            Action::TurnRight => state.heading = (state.heading + 90) % 360,
            Action::Unknown(name) => return Err(CommandError::UnknownCommand(name.clone())),
        }

        Ok(*state)
    }

    /// One telemetry tick: a moving vehicle spends 1% battery.
    ///
    /// Returns the reading taken under the same lock as the drain.
    pub fn drain_tick(&self) -> VehicleState {
        let mut state = self.state.lock();
        if state.speed > 0.0 {
            state.battery = state.battery.saturating_sub(1);
        }
        *state
    }
}
