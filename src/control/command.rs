//! Discrete commands understood by the vehicle.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One instruction for the vehicle.
///
/// Motion commands are exclusive; parameter commands carry a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuationCommand {
    Stop,
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    /// Drive speed, 0-255
    Speed(u8),
    /// LED intensity, 0-255
    Light(u8),
    /// Camera pan angle
    ServoX(u8),
    /// Camera tilt angle
    ServoY(u8),
}

/// Command channel on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MoveCar,
    Speed,
    Light,
    ServoX,
    ServoY,
}

impl ActuationCommand {
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Self::Stop | Self::Forward | Self::Backward | Self::TurnLeft | Self::TurnRight
        )
    }

    /// Channel and value as sent to the device. Motion codes are
    /// 0 stop, 1 forward, 2 backward, 3 left, 4 right.
    pub fn encode(&self) -> (CommandKind, u8) {
        match *self {
            Self::Stop => (CommandKind::MoveCar, 0),
            Self::Forward => (CommandKind::MoveCar, 1),
            Self::Backward => (CommandKind::MoveCar, 2),
            Self::TurnLeft => (CommandKind::MoveCar, 3),
            Self::TurnRight => (CommandKind::MoveCar, 4),
            Self::Speed(v) => (CommandKind::Speed, v),
            Self::Light(v) => (CommandKind::Light, v),
            Self::ServoX(v) => (CommandKind::ServoX, v),
            Self::ServoY(v) => (CommandKind::ServoY, v),
        }
    }
}

impl fmt::Display for ActuationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
            Self::TurnLeft => f.write_str("left"),
            Self::TurnRight => f.write_str("right"),
            Self::Speed(v) => write!(f, "speed {v}"),
            Self::Light(v) => write!(f, "light {v}"),
            Self::ServoX(v) => write!(f, "servo-x {v}"),
            Self::ServoY(v) => write!(f, "servo-y {v}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),

    #[error("{command} needs a value between 0 and 255")]
    MissingValue { command: &'static str },
}

/// Parses the operator console syntax: `w`/`forward`, `s`/`backward`,
/// `a`/`left`, `d`/`right`, `x`/`stop`, `speed N`, `light N`,
/// `servo-x N`, `servo-y N`.
impl FromStr for ActuationCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let head = parts.next().unwrap_or_default().to_ascii_lowercase();
        let mut value = |command: &'static str| {
            parts
                .next()
                .and_then(|v| v.parse::<u8>().ok())
                .ok_or(ParseCommandError::MissingValue { command })
        };

        match head.as_str() {
            "w" | "forward" => Ok(Self::Forward),
            "s" | "backward" => Ok(Self::Backward),
            "a" | "left" => Ok(Self::TurnLeft),
            "d" | "right" => Ok(Self::TurnRight),
            "x" | "stop" => Ok(Self::Stop),
            "speed" => value("speed").map(Self::Speed),
            "light" => value("light").map(Self::Light),
            "servo-x" | "pan" => value("servo-x").map(Self::ServoX),
            "servo-y" | "tilt" => value("servo-y").map(Self::ServoY),
            _ => Err(ParseCommandError::Unknown(s.trim().to_string())),
        }
    }
}
