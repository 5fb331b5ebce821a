// Timeouts, topics, calibration
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::motion::{ApproachGuard, BandTable, PrimitiveTable};

// Behavior loop pacing between ticks
pub const PACING_INTERVAL: Duration = Duration::from_millis(500);

// Sonar reading timeout for watchdog
pub const SONAR_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_SONAR: &str = "mazebot/sensor/sonar/**"; // sonar readings
pub const TOPIC_RT_DRIVE: &str = "mazebot/rt/drive"; // actuation
pub const TOPIC_HEALTH: &str = "mazebot/state/health"; // health status

// Serial port for the Create base
pub const CREATE_PORT: &str = "/dev/ttyUSB0";

// Simulated arena (mm); the robot starts at its center facing +x
pub const SIM_ARENA_MM: (f64, f64) = (6000.0, 3000.0);

/// All tunable constants of one physical robot
///
/// Recalibrating for a different base or cell size only touches this
/// document; a JSON file may override any subset of the sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub primitives: PrimitiveTable,
    pub bands: BandTable,
    pub guard: ApproachGuard,
    #[serde(rename = "pacing_secs", with = "crate::motion::secs")]
    pub pacing: Duration,
    /// Actuator retries (with reset in between) before a fault is fatal
    pub retries: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            primitives: PrimitiveTable::default(),
            bands: BandTable::default(),
            guard: ApproachGuard::default(),
            pacing: PACING_INTERVAL,
            retries: 0,
        }
    }
}

impl Calibration {
    /// Load and validate a calibration file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading calibration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let calibration: Self = serde_json::from_str(text)?;
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.primitives.validate()?;
        self.bands.validate()?;
        self.guard.validate(&self.bands)
    }
}
