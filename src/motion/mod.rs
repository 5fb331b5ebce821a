// Motion layer for the maze robot
//
// Provides:
// - Drive commands in Create units (mm/s, mm)
// - Open-loop timed primitives (forward, quarter turns, quarter curves)
// - The closed-loop wall approach built on banded forward speeds

pub mod approach;
pub mod primitives;

pub use approach::{approach_wall, ApproachGuard, ApproachReport, Band, BandSelection, BandTable};
pub use primitives::{Primitive, PrimitiveName, PrimitiveTable, TimedMotion};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Maximum wheel or body speed accepted by the base (mm/s)
pub const MAX_VELOCITY_MM_S: i16 = 500;

/// Maximum turn radius magnitude for a regular curve (mm)
pub const MAX_RADIUS_MM: i16 = 2000;

/// Special radius values understood by the Create drive opcode
pub const RADIUS_STRAIGHT: i16 = 0x7FFF;
pub const RADIUS_SPIN_LEFT: i16 = 1;
pub const RADIUS_SPIN_RIGHT: i16 = -1;

/// Sonar mounting direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[serde(alias = "center")]
    Forward,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single actuator command
///
/// `Wheels` drives each wheel independently (Create "drive direct").
/// `Curve` drives at `speed` along a circle of `radius`; positive radius
/// curves left, negative curves right, larger magnitudes curve more gently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveCommand {
    Wheels { left: i16, right: i16 },
    Curve { speed: i16, radius: i16 },
}

impl DriveCommand {
    pub fn straight(speed: i16) -> Self {
        DriveCommand::Wheels {
            left: speed,
            right: speed,
        }
    }

    /// Net forward speed of the robot body (mm/s)
    pub fn forward_speed(&self) -> f32 {
        match *self {
            DriveCommand::Wheels { left, right } => (left as f32 + right as f32) / 2.0,
            DriveCommand::Curve { radius, .. }
                if radius == RADIUS_SPIN_LEFT || radius == RADIUS_SPIN_RIGHT =>
            {
                0.0
            }
            DriveCommand::Curve { speed, .. } => speed as f32,
        }
    }

    /// Check the command against actuator-safe limits
    pub fn validate(&self) -> Result<()> {
        let check_speed = |name: &str, v: i16| {
            if v.unsigned_abs() > MAX_VELOCITY_MM_S as u16 {
                Err(Error::InvalidCommand(format!(
                    "{name} velocity {v} mm/s exceeds ±{MAX_VELOCITY_MM_S} mm/s"
                )))
            } else {
                Ok(())
            }
        };

        match *self {
            DriveCommand::Wheels { left, right } => {
                check_speed("left", left)?;
                check_speed("right", right)
            }
            DriveCommand::Curve { speed, radius } => {
                check_speed("curve", speed)?;
                let special = matches!(radius, RADIUS_STRAIGHT | RADIUS_SPIN_LEFT | RADIUS_SPIN_RIGHT);
                if !special && (radius == 0 || radius.unsigned_abs() > MAX_RADIUS_MM as u16) {
                    return Err(Error::InvalidCommand(format!(
                        "turn radius {radius} mm outside ±{MAX_RADIUS_MM} mm"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveCommand::Wheels { left, right } => write!(f, "wheels(left={left}, right={right})"),
            DriveCommand::Curve { speed, radius } => write!(f, "curve(speed={speed}, radius={radius})"),
        }
    }
}

/// Serialize `Duration` values as fractional seconds
pub(crate) mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_speed() {
        assert_eq!(DriveCommand::straight(500).forward_speed(), 500.0);
        assert_eq!(DriveCommand::Wheels { left: -400, right: 400 }.forward_speed(), 0.0);
        assert_eq!(DriveCommand::Curve { speed: 500, radius: 417 }.forward_speed(), 500.0);
        assert_eq!(DriveCommand::Curve { speed: 300, radius: RADIUS_SPIN_LEFT }.forward_speed(), 0.0);
    }

    #[test]
    fn test_validate_limits() {
        assert!(DriveCommand::straight(500).validate().is_ok());
        assert!(DriveCommand::straight(501).validate().is_err());
        assert!(DriveCommand::Wheels { left: -500, right: 100 }.validate().is_ok());
        assert!(DriveCommand::Curve { speed: 500, radius: -833 }.validate().is_ok());
        assert!(DriveCommand::Curve { speed: 500, radius: RADIUS_STRAIGHT }.validate().is_ok());
        assert!(DriveCommand::Curve { speed: 500, radius: 0 }.validate().is_err());
        assert!(DriveCommand::Curve { speed: 500, radius: 2500 }.validate().is_err());
    }

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_string(&DriveCommand::Curve { speed: 500, radius: 417 }).unwrap();
        assert_eq!(json, r#"{"kind":"curve","speed":500,"radius":417}"#);
    }

    #[test]
    fn test_direction_wire_names() {
        let d: Direction = serde_json::from_str(r#""center""#).unwrap();
        assert_eq!(d, Direction::Forward);
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), r#""left""#);
        assert!(serde_json::from_str::<Direction>(r#""up""#).is_err());
    }
}
