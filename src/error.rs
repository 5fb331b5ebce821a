// Error types for the maze robot runtime

use std::time::Duration;

use crate::motion::Direction;

/// Error types for hardware access, calibration and control
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zenoh error: {0}")]
    Zenoh(String),

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Invalid drive command: {0}")]
    InvalidCommand(String),

    #[error("Invalid calibration: {0}")]
    Calibration(String),

    #[error("Rejected {direction} sonar sample: {value} cm")]
    InvalidSample { direction: Direction, value: f32 },

    #[error("No {direction} sonar reading received yet")]
    SensorUnavailable { direction: Direction },

    #[error("{direction} sonar reading is stale ({age:?} old)")]
    SensorStale { direction: Direction, age: Duration },

    #[error("Target standoff not reached after {ticks} ticks (last distance {last_distance_cm} cm)")]
    TargetNotReached { ticks: u32, last_distance_cm: f32 },

    #[error("Hardware connection already released")]
    Released,
}

pub type Result<T> = std::result::Result<T, Error>;
