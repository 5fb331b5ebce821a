// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::motion::{Direction, DriveCommand};

// Sonar node -> runtime, and the in-process reading handed to the controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SonarSample {
    pub direction: Direction,
    pub distance_cm: f32,
}

impl SonarSample {
    pub fn new(direction: Direction, distance_cm: f32) -> Self {
        Self {
            direction,
            distance_cm,
        }
    }
}

// Actuation output from runtime -> telemetry consumers
// `command: None` means the wheels were stopped
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DriveActuation {
    pub command: Option<DriveCommand>,
    pub at_secs: f64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    SonarStale,
    TargetNotReached,
    Fault,
    Stopped,
}

/// Everything the robot handle reports while it runs
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    Actuation(DriveActuation),
    Sample(SonarSample),
    Health(RuntimeHealth),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sonar_sample_wire_format() {
        let sample: SonarSample =
            serde_json::from_str(r#"{"direction":"center","distance_cm":87.5}"#).unwrap();
        assert_eq!(sample, SonarSample::new(Direction::Forward, 87.5));
    }

    #[test]
    fn test_health_wire_format() {
        let json = serde_json::to_string(&RuntimeHealth::TargetNotReached).unwrap();
        assert_eq!(json, r#""target_not_reached""#);
    }

    #[test]
    fn test_stop_actuation_has_no_command() {
        let json = serde_json::to_string(&DriveActuation::default()).unwrap();
        assert_eq!(json, r#"{"command":null,"at_secs":0.0}"#);
    }
}
