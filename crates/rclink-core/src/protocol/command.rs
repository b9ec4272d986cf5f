//! The outbound [`Command`] value object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::motion::{ControlMode, Direction, Intent, Speed};

/// One command for the vehicle receiver.
///
/// Commands are immutable values with exactly one canonical serialization
/// (see [`crate::protocol::codec::encode`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Drive in `direction` at `speed` until told otherwise.
    Drive { direction: Direction, speed: Speed },
    /// Halt the motors.
    Stop,
    /// Tell the receiver which input mode is now in charge.
    SetMode(ControlMode),
}

/// How the link manager treats a command with respect to send throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Subject to the rate limiter; silently dropped when it would exceed the
    /// minimum send interval.
    Throttled,
    /// Always written when the link is up.
    Guaranteed,
}

impl Command {
    /// Builds the command that expresses `intent` at `speed`.
    ///
    /// `Intent::Stop` maps to [`Command::Stop`] regardless of speed.
    pub fn for_intent(intent: Intent, speed: Speed) -> Self {
        match intent.direction() {
            Some(direction) => Command::Drive { direction, speed },
            None => Command::Stop,
        }
    }

    /// The leading character on the wire.
    pub fn tag(&self) -> char {
        match self {
            Command::Drive { direction, .. } => direction.tag(),
            Command::Stop => 'S',
            Command::SetMode(_) => 'M',
        }
    }

    /// Directional commands are throttled; stop and mode changes are never
    /// dropped.
    pub fn delivery(&self) -> Delivery {
        match self {
            Command::Drive { .. } => Delivery::Throttled,
            Command::Stop | Command::SetMode(_) => Delivery::Guaranteed,
        }
    }
}

/// Renders the wire text without the trailing newline, e.g. `F200` or `MG`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Drive { direction, speed } => write!(f, "{}{}", direction.tag(), speed),
            Command::Stop => f.write_str("S"),
            Command::SetMode(mode) => write!(f, "M{}", mode.letter()),
        }
    }
}
