// Open-loop motion primitives
//
// Each primitive issues one drive command, holds it for a calibrated
// duration and stops. Nothing is sensed, so accuracy is only as good as
// the calibration. A primitive without its own calibration can be
// composed from repeats of a calibrated one (three quarter turns left
// for one quarter turn right); that costs accumulated error and time, so
// composed entries stay distinguishable from calibrated ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::DriveCommand;
use crate::error::{Error, Result};
use crate::robot::{Clock, Hardware, Robot};

/// Names of the primitives a maze script can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimitiveName {
    Forward,
    TurnLeft,
    TurnRight,
    CurveLeft,
    CurveRight,
}

impl PrimitiveName {
    pub const ALL: [PrimitiveName; 5] = [
        PrimitiveName::Forward,
        PrimitiveName::TurnLeft,
        PrimitiveName::TurnRight,
        PrimitiveName::CurveLeft,
        PrimitiveName::CurveRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveName::Forward => "forward",
            PrimitiveName::TurnLeft => "turn-left",
            PrimitiveName::TurnRight => "turn-right",
            PrimitiveName::CurveLeft => "curve-left",
            PrimitiveName::CurveRight => "curve-right",
        }
    }
}

impl fmt::Display for PrimitiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimitiveName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(PrimitiveName::Forward),
            "turn-left" | "left" => Ok(PrimitiveName::TurnLeft),
            "turn-right" | "right" => Ok(PrimitiveName::TurnRight),
            "curve-left" => Ok(PrimitiveName::CurveLeft),
            "curve-right" => Ok(PrimitiveName::CurveRight),
            other => Err(Error::Calibration(format!("unknown primitive '{other}'"))),
        }
    }
}

/// Apply a command, hold it for `duration`, then stop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedMotion {
    pub command: DriveCommand,
    #[serde(rename = "duration_secs", with = "super::secs")]
    pub duration: Duration,
}

impl TimedMotion {
    pub fn new(command: DriveCommand, duration: Duration) -> Self {
        Self { command, duration }
    }

    /// Blocks for the full duration; there is no early exit
    pub fn run<H: Hardware, C: Clock>(&self, robot: &mut Robot<H, C>) -> Result<()> {
        robot.drive(self.command)?;
        robot.pause(self.duration);
        robot.stop()
    }
}

/// Table entry: either calibrated directly or approximated by repeats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Calibrated(TimedMotion),
    Composed { of: PrimitiveName, times: u32 },
}

impl Primitive {
    pub fn is_approximate(&self) -> bool {
        matches!(self, Primitive::Composed { .. })
    }
}

/// Immutable primitive calibration, one entry per name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimitiveTable {
    entries: BTreeMap<PrimitiveName, Primitive>,
}

impl PrimitiveTable {
    pub fn new(entries: impl IntoIterator<Item = (PrimitiveName, Primitive)>) -> Result<Self> {
        let table = Self {
            entries: entries.into_iter().collect(),
        };
        table.validate()?;
        Ok(table)
    }

    pub fn get(&self, name: PrimitiveName) -> Option<&Primitive> {
        self.entries.get(&name)
    }

    pub fn names(&self) -> impl Iterator<Item = PrimitiveName> + '_ {
        self.entries.keys().copied()
    }

    /// Check limits and that composed entries repeat a calibrated primitive
    pub fn validate(&self) -> Result<()> {
        for (name, primitive) in &self.entries {
            match primitive {
                Primitive::Calibrated(motion) => {
                    motion.command.validate()?;
                    if motion.duration.is_zero() {
                        return Err(Error::Calibration(format!("{name} has zero duration")));
                    }
                }
                Primitive::Composed { of, times } => {
                    if *times == 0 {
                        return Err(Error::Calibration(format!("{name} repeats {of} zero times")));
                    }
                    match self.entries.get(of) {
                        Some(Primitive::Calibrated(_)) => {}
                        Some(Primitive::Composed { .. }) => {
                            return Err(Error::Calibration(format!(
                                "{name} is composed from {of}, which is itself composed"
                            )));
                        }
                        None => {
                            return Err(Error::Calibration(format!(
                                "{name} is composed from missing primitive {of}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The calibrated motion behind `name` and how many times it runs
    pub fn resolve(&self, name: PrimitiveName) -> Result<(TimedMotion, u32)> {
        let missing = || Error::Calibration(format!("no calibration for {name}"));
        match self.entries.get(&name).ok_or_else(missing)? {
            Primitive::Calibrated(motion) => Ok((*motion, 1)),
            Primitive::Composed { of, times } => match self.entries.get(of) {
                Some(Primitive::Calibrated(motion)) => Ok((*motion, *times)),
                _ => Err(missing()),
            },
        }
    }

    /// Total time the primitive keeps the robot busy
    pub fn nominal_duration(&self, name: PrimitiveName) -> Result<Duration> {
        let (motion, times) = self.resolve(name)?;
        Ok(motion.duration * times)
    }

    /// Run one primitive to completion
    pub fn run<H: Hardware, C: Clock>(&self, name: PrimitiveName, robot: &mut Robot<H, C>) -> Result<()> {
        let (motion, times) = self.resolve(name)?;
        if times > 1 {
            info!("{} approximated by {} repeats of a calibrated primitive", name, times);
        }
        debug!("Primitive {}: {} for {:?} x{}", name, motion.command, motion.duration, times);
        for _ in 0..times {
            motion.run(robot)?;
        }
        Ok(())
    }
}

impl Default for PrimitiveTable {
    /// Calibration for a Create base on 833 mm grid cells
    fn default() -> Self {
        let timed = |command, ms| Primitive::Calibrated(TimedMotion::new(command, Duration::from_millis(ms)));
        Self {
            entries: BTreeMap::from([
                (PrimitiveName::Forward, timed(DriveCommand::straight(500), 1642)),
                (
                    PrimitiveName::TurnLeft,
                    timed(DriveCommand::Wheels { left: -400, right: 400 }, 436),
                ),
                (
                    PrimitiveName::TurnRight,
                    timed(DriveCommand::Wheels { left: 400, right: -400 }, 436),
                ),
                (
                    PrimitiveName::CurveLeft,
                    timed(DriveCommand::Curve { speed: 500, radius: 417 }, 1650),
                ),
                (
                    PrimitiveName::CurveRight,
                    timed(DriveCommand::Curve { speed: 500, radius: -417 }, 1650),
                ),
            ]),
        }
    }
}
