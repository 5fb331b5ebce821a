// Closed-loop wall approach
//
// Drives forward until the forward sonar reads at or below the standoff
// distance. The sensed distance selects one band of a small table; each
// band holds a forward command and the tick to hold it before the next
// sample, so the robot slows down and samples faster as the wall nears.
//
//   [0, standoff]                -> stop
//   (standoff, bands[1].above]   -> bands[0]
//   ...
//   (bands[n-1].above, inf)      -> bands[n-1]

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Direction, DriveCommand};
use crate::error::{Error, Result};
use crate::robot::{Clock, Hardware, Robot};

/// One distance band: applies to distances above `above_cm` up to the next band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub above_cm: f32,
    pub command: DriveCommand,
    #[serde(rename = "tick_secs", with = "super::secs")]
    pub tick: Duration,
}

impl Band {
    pub fn new(name: &str, above_cm: f32, command: DriveCommand, tick: Duration) -> Self {
        Self {
            name: name.to_string(),
            above_cm,
            command,
            tick,
        }
    }
}

/// Result of looking a distance up in the band table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandSelection<'a> {
    Stop,
    Drive(&'a Band),
}

/// Ordered partition of [0, inf) into a stop interval and drive bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BandTableDoc")]
pub struct BandTable {
    standoff_cm: f32,
    bands: Vec<Band>,
}

// Calibration files may list bands in any order
#[derive(Deserialize)]
struct BandTableDoc {
    standoff_cm: f32,
    bands: Vec<Band>,
}

impl From<BandTableDoc> for BandTable {
    fn from(doc: BandTableDoc) -> Self {
        Self::sorted(doc.standoff_cm, doc.bands)
    }
}

impl BandTable {
    /// Build a table; bands may be given in any order
    pub fn new(standoff_cm: f32, bands: Vec<Band>) -> Result<Self> {
        let table = Self::sorted(standoff_cm, bands);
        table.validate()?;
        Ok(table)
    }

    fn sorted(standoff_cm: f32, mut bands: Vec<Band>) -> Self {
        bands.sort_by(|a, b| a.above_cm.total_cmp(&b.above_cm));
        Self { standoff_cm, bands }
    }

    pub fn standoff_cm(&self) -> f32 {
        self.standoff_cm
    }

    /// Bands from nearest to farthest
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Inclusive upper bound of band `index`, `None` for the outermost band
    pub fn upper_cm(&self, index: usize) -> Option<f32> {
        self.bands.get(index + 1).map(|b| b.above_cm)
    }

    /// Tick of the innermost band, the finest control resolution
    pub fn finest_tick(&self) -> Duration {
        self.bands.first().map(|b| b.tick).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::Calibration(reason));

        if !self.standoff_cm.is_finite() || self.standoff_cm <= 0.0 {
            return invalid(format!("standoff {} cm must be positive", self.standoff_cm));
        }
        let Some(innermost) = self.bands.first() else {
            return invalid("band table has no drive bands".to_string());
        };
        if innermost.above_cm != self.standoff_cm {
            return invalid(format!(
                "innermost band starts at {} cm, standoff is {} cm",
                innermost.above_cm, self.standoff_cm
            ));
        }

        for band in &self.bands {
            band.command.validate()?;
            if band.command.forward_speed() <= 0.0 {
                return invalid(format!("band '{}' does not drive forward", band.name));
            }
            if band.tick.is_zero() {
                return invalid(format!("band '{}' has zero tick", band.name));
            }
        }

        for pair in self.bands.windows(2) {
            let (near, far) = (&pair[0], &pair[1]);
            if far.above_cm <= near.above_cm {
                return invalid(format!("bands '{}' and '{}' overlap", near.name, far.name));
            }
            if far.command.forward_speed() < near.command.forward_speed() {
                return invalid(format!(
                    "band '{}' is faster than farther band '{}'",
                    near.name, far.name
                ));
            }
            if far.tick < near.tick {
                return invalid(format!(
                    "band '{}' ticks slower than farther band '{}'",
                    near.name, far.name
                ));
            }
        }
        Ok(())
    }

    /// Exactly one outcome for every distance; NaN selects stop
    pub fn select(&self, distance_cm: f32) -> BandSelection<'_> {
        if distance_cm <= self.standoff_cm {
            return BandSelection::Stop;
        }
        match self.bands.iter().rev().find(|b| distance_cm > b.above_cm) {
            Some(band) => BandSelection::Drive(band),
            None => BandSelection::Stop,
        }
    }
}

impl Default for BandTable {
    /// 66 cm standoff (one grid cell from the wall)
    fn default() -> Self {
        Self {
            standoff_cm: 66.0,
            bands: vec![
                Band::new("slow", 66.0, DriveCommand::straight(200), Duration::from_millis(30)),
                Band::new("medium", 72.0, DriveCommand::straight(500), Duration::from_millis(100)),
                Band::new("fast", 108.0, DriveCommand::straight(500), Duration::from_secs(1)),
            ],
        }
    }
}

/// Termination guard and sonar sanity limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproachGuard {
    /// Drive ticks allowed before giving up
    pub max_ticks: u32,
    #[serde(with = "optional_secs", rename = "deadline_secs")]
    pub deadline: Option<Duration>,
    /// Readings below this are echo timeouts or noise
    pub min_range_cm: f32,
    /// Readings above this are clamped
    pub max_range_cm: f32,
    pub max_invalid_samples: u32,
}

impl ApproachGuard {
    pub fn validate(&self, table: &BandTable) -> Result<()> {
        if self.max_ticks == 0 {
            return Err(Error::Calibration("max_ticks must be at least 1".to_string()));
        }
        if !(self.min_range_cm >= 0.0 && self.min_range_cm < table.standoff_cm()) {
            return Err(Error::Calibration(format!(
                "min range {} cm must lie in [0, standoff)",
                self.min_range_cm
            )));
        }
        if !(self.max_range_cm > table.standoff_cm()) {
            return Err(Error::Calibration(format!(
                "max range {} cm must exceed the standoff",
                self.max_range_cm
            )));
        }
        Ok(())
    }

    /// Clamp a raw reading, or `None` when it must be rejected
    pub fn sanitize(&self, distance_cm: f32) -> Option<f32> {
        if distance_cm.is_nan() || distance_cm < self.min_range_cm {
            None
        } else {
            Some(distance_cm.min(self.max_range_cm))
        }
    }
}

impl Default for ApproachGuard {
    fn default() -> Self {
        Self {
            max_ticks: 500,
            deadline: Some(Duration::from_secs(60)),
            min_range_cm: 2.0,
            max_range_cm: 400.0,
            max_invalid_samples: 5,
        }
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Summary of a completed approach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachReport {
    pub ticks: u32,
    pub final_distance_cm: f32,
    pub elapsed: Duration,
}

/// Drive forward until the wall ahead is within the standoff distance
///
/// Always leaves the wheels stopped: on success, on guard expiry and
/// (best effort) on hardware faults.
pub fn approach_wall<H: Hardware, C: Clock>(
    robot: &mut Robot<H, C>,
    table: &BandTable,
    guard: &ApproachGuard,
) -> Result<ApproachReport> {
    let result = run_approach(robot, table, guard);
    if let Err(e) = &result {
        if !matches!(e, Error::TargetNotReached { .. } | Error::InvalidSample { .. }) {
            if let Err(stop_err) = robot.stop() {
                warn!("Failed to stop after approach fault: {}", stop_err);
            }
        }
    }
    result
}

fn run_approach<H: Hardware, C: Clock>(
    robot: &mut Robot<H, C>,
    table: &BandTable,
    guard: &ApproachGuard,
) -> Result<ApproachReport> {
    let started = robot.elapsed();
    let mut ticks = 0u32;
    let mut rejected = 0u32;
    let mut last_distance = f32::NAN;
    let mut current_band: Option<&str> = None;

    info!("Approaching wall, standoff {} cm", table.standoff_cm());

    loop {
        let sample = robot.read(Direction::Forward)?;
        let Some(distance) = guard.sanitize(sample.distance_cm) else {
            rejected += 1;
            warn!(
                "Rejected forward sonar sample {} cm ({}/{})",
                sample.distance_cm, rejected, guard.max_invalid_samples
            );
            robot.stop()?;
            if rejected >= guard.max_invalid_samples {
                return Err(Error::InvalidSample {
                    direction: Direction::Forward,
                    value: sample.distance_cm,
                });
            }
            robot.pause(table.finest_tick());
            continue;
        };
        rejected = 0;
        last_distance = distance;

        let band = match table.select(distance) {
            BandSelection::Stop => {
                robot.stop()?;
                let report = ApproachReport {
                    ticks,
                    final_distance_cm: distance,
                    elapsed: robot.elapsed().saturating_sub(started),
                };
                info!(
                    "Reached standoff at {:.1} cm after {} ticks ({:?})",
                    distance, report.ticks, report.elapsed
                );
                return Ok(report);
            }
            BandSelection::Drive(band) => band,
        };

        let elapsed = robot.elapsed().saturating_sub(started);
        let out_of_time = guard.deadline.is_some_and(|deadline| elapsed >= deadline);
        if ticks >= guard.max_ticks || out_of_time {
            robot.stop()?;
            warn!(
                "Giving up approach after {} ticks ({:?}), wall still {:.1} cm away",
                ticks, elapsed, last_distance
            );
            return Err(Error::TargetNotReached {
                ticks,
                last_distance_cm: last_distance,
            });
        }

        if current_band != Some(band.name.as_str()) {
            debug!("Entering {} band at {:.1} cm", band.name, distance);
            current_band = Some(band.name.as_str());
        }
        robot.drive(band.command)?;
        robot.pause(band.tick);
        ticks += 1;
    }
}
