//! Operator-facing motion values: intent, speed, and control mode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The currently requested direction of motion, or `Stop`.
///
/// `Stop` is both a value and the idle default.  At most one intent is active
/// at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Intent {
    Forward,
    Backward,
    Left,
    Right,
    #[default]
    Stop,
}

impl Intent {
    /// The single-character wire tag for this intent.
    pub fn tag(self) -> char {
        match self {
            Intent::Forward => 'F',
            Intent::Backward => 'B',
            Intent::Left => 'L',
            Intent::Right => 'R',
            Intent::Stop => 'S',
        }
    }

    /// Inverse of [`Intent::tag`].
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'F' => Some(Intent::Forward),
            'B' => Some(Intent::Backward),
            'L' => Some(Intent::Left),
            'R' => Some(Intent::Right),
            'S' => Some(Intent::Stop),
            _ => None,
        }
    }

    /// `true` for every intent that moves the vehicle.
    pub fn is_motion(self) -> bool {
        !matches!(self, Intent::Stop)
    }

    /// The direction this intent drives in, or `None` for `Stop`.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Intent::Forward => Some(Direction::Forward),
            Intent::Backward => Some(Direction::Backward),
            Intent::Left => Some(Direction::Left),
            Intent::Right => Some(Direction::Right),
            Intent::Stop => None,
        }
    }
}

impl From<Direction> for Intent {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Intent::Forward,
            Direction::Backward => Intent::Backward,
            Direction::Left => Intent::Left,
            Direction::Right => Intent::Right,
        }
    }
}

/// The moving subset of [`Intent`].
///
/// A directional command can only be built from a `Direction`, so a
/// "drive at speed N in direction Stop" command is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    pub fn tag(self) -> char {
        Intent::from(self).tag()
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        Intent::from_tag(tag).and_then(Intent::direction)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Forward => "forward",
            Intent::Backward => "backward",
            Intent::Left => "left",
            Intent::Right => "right",
            Intent::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Motor speed in `[0, 255]`.
///
/// The `u8` representation makes the range an invariant of the type; callers
/// holding a wider integer (for example a slider position) go through
/// [`Speed::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Speed(u8);

impl Speed {
    pub const MIN: Speed = Speed(0);
    pub const MAX: Speed = Speed(u8::MAX);
    /// Mid-range default applied when a session starts.
    pub const DEFAULT: Speed = Speed(128);

    pub const fn new(value: u8) -> Self {
        Speed(value)
    }

    /// Saturates `value` into `[0, 255]`.
    pub fn clamped(value: i64) -> Self {
        Speed(value.clamp(0, i64::from(u8::MAX)) as u8)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Speed as a whole percentage of full scale, as shown on a slider label.
    pub fn percent(self) -> u8 {
        ((u16::from(self.0) * 100) / u16::from(u8::MAX)) as u8
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::DEFAULT
    }
}

impl From<u8> for Speed {
    fn from(value: u8) -> Self {
        Speed(value)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which input modality is driving the vehicle.
///
/// `Bluetooth` is the direct button/slider mode.  `Gesture` and `Webcam` are
/// alternate inputs whose subsystems live outside the core; switching mode
/// only toggles them and tells the peer via the `M<letter>` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlMode {
    #[default]
    Bluetooth,
    Gesture,
    Webcam,
}

impl ControlMode {
    pub const ALL: [ControlMode; 3] = [ControlMode::Bluetooth, ControlMode::Gesture, ControlMode::Webcam];

    /// Second character of the mode-change command.
    pub fn letter(self) -> char {
        match self {
            ControlMode::Bluetooth => 'B',
            ControlMode::Gesture => 'G',
            ControlMode::Webcam => 'W',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'B' => Some(ControlMode::Bluetooth),
            'G' => Some(ControlMode::Gesture),
            'W' => Some(ControlMode::Webcam),
            _ => None,
        }
    }

    /// `true` for modes backed by an alternate-input subsystem.
    pub fn is_alternate(self) -> bool {
        !matches!(self, ControlMode::Bluetooth)
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlMode::Bluetooth => "bluetooth",
            ControlMode::Gesture => "gesture",
            ControlMode::Webcam => "webcam",
        };
        f.write_str(name)
    }
}
