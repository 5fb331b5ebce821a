// Behavior loop and the programs that run on it
//
// A behavior goes through three phases: setup once, ticks until it asks
// to stop, and shutdown once. Shutdown always runs, also after a failed
// setup or tick, and always releases the hardware connection. A panic
// unwinding through the loop still releases it through `Robot`'s drop.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Calibration;
use crate::error::{Error, Result};
use crate::messages::RuntimeHealth;
use crate::motion::{approach_wall, Direction, PrimitiveName};
use crate::robot::{Clock, Hardware, Robot};

/// Per-tick logic driven by a `BehaviorLoop`
pub trait Behavior {
    /// Runs once before the first tick
    fn setup<H: Hardware, C: Clock>(&mut self, _robot: &mut Robot<H, C>) -> Result<()> {
        Ok(())
    }

    /// One iteration; `Ok(false)` ends the loop
    fn tick<H: Hardware, C: Clock>(&mut self, robot: &mut Robot<H, C>) -> Result<bool>;

    /// Runs once after the loop, before the hardware is released
    fn shutdown<H: Hardware, C: Clock>(&mut self, _robot: &mut Robot<H, C>) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle phase, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Running,
    Shutdown,
}

/// Summary of a finished loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub ticks: u64,
}

/// Setup, repeat-until-signaled, shutdown
#[derive(Debug, Clone)]
pub struct BehaviorLoop {
    pacing: Duration,
    max_ticks: Option<u64>,
}

impl BehaviorLoop {
    /// Pause for `pacing` between ticks
    pub fn new(pacing: Duration) -> Self {
        Self {
            pacing,
            max_ticks: None,
        }
    }

    /// Back-to-back ticks, for scripts
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Run all three phases; the robot is released when this returns
    pub fn run<B, H, C>(&self, robot: &mut Robot<H, C>, behavior: &mut B) -> Result<LoopReport>
    where
        B: Behavior,
        H: Hardware,
        C: Clock,
    {
        let mut ticks = 0u64;
        let outcome = self.run_until_signaled(robot, behavior, &mut ticks);

        info!("Phase {:?} after {} ticks", Phase::Shutdown, ticks);
        if let Err(e) = &outcome {
            warn!("Behavior ended abnormally: {}", e);
            robot.report_health(health_for(e));
        }
        let hook = behavior.shutdown(robot);
        if let Err(e) = &hook {
            warn!("Shutdown hook failed: {}", e);
        }
        let released = robot.release();

        outcome.and(hook).and(released)?;
        Ok(LoopReport { ticks })
    }

    fn run_until_signaled<B, H, C>(
        &self,
        robot: &mut Robot<H, C>,
        behavior: &mut B,
        ticks: &mut u64,
    ) -> Result<()>
    where
        B: Behavior,
        H: Hardware,
        C: Clock,
    {
        info!("Phase {:?}", Phase::Setup);
        behavior.setup(robot)?;

        info!("Phase {:?}", Phase::Running);
        robot.report_health(RuntimeHealth::Ok);
        loop {
            *ticks += 1;
            if !behavior.tick(robot)? {
                return Ok(());
            }
            if self.max_ticks.is_some_and(|max| *ticks >= max) {
                info!("Tick limit {} reached", *ticks);
                return Ok(());
            }
            if !self.pacing.is_zero() {
                robot.pause(self.pacing);
            }
        }
    }
}

fn health_for(error: &Error) -> RuntimeHealth {
    match error {
        Error::SensorStale { .. } | Error::SensorUnavailable { .. } => RuntimeHealth::SonarStale,
        Error::TargetNotReached { .. } => RuntimeHealth::TargetNotReached,
        _ => RuntimeHealth::Fault,
    }
}

/// What one script step does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Primitive(PrimitiveName),
    ToWall,
}

/// One script step, optionally repeated (`forward*3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub repeat: u32,
}

impl FromStr for Step {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, repeat) = match s.split_once('*') {
            Some((name, count)) => {
                let repeat = count
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::Calibration(format!("bad repeat count in '{s}'")))?;
                (name.trim(), repeat)
            }
            None => (s.trim(), 1),
        };
        let action = match name {
            "to-wall" | "wall" => Action::ToWall,
            other => Action::Primitive(other.parse()?),
        };
        Ok(Step { action, repeat })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Action::Primitive(name) => write!(f, "{name}")?,
            Action::ToWall => f.write_str("to-wall")?,
        }
        if self.repeat > 1 {
            write!(f, "*{}", self.repeat)?;
        }
        Ok(())
    }
}

/// A fixed maze script: one step per tick, stops after the last
pub struct Script<'a> {
    calibration: &'a Calibration,
    steps: Vec<Step>,
    next: usize,
}

impl<'a> Script<'a> {
    pub fn new(calibration: &'a Calibration, steps: Vec<Step>) -> Self {
        Self {
            calibration,
            steps,
            next: 0,
        }
    }

    pub fn parse(calibration: &'a Calibration, steps: &[String]) -> Result<Self> {
        let steps = steps.iter().map(|s| s.parse()).collect::<Result<Vec<Step>>>()?;
        Ok(Self::new(calibration, steps))
    }
}

impl Behavior for Script<'_> {
    fn setup<H: Hardware, C: Clock>(&mut self, _robot: &mut Robot<H, C>) -> Result<()> {
        info!("Script with {} steps", self.steps.len());
        Ok(())
    }

    fn tick<H: Hardware, C: Clock>(&mut self, robot: &mut Robot<H, C>) -> Result<bool> {
        let Some(step) = self.steps.get(self.next).copied() else {
            return Ok(false);
        };
        info!("Step {}/{}: {}", self.next + 1, self.steps.len(), step);
        for _ in 0..step.repeat {
            match step.action {
                Action::Primitive(name) => self.calibration.primitives.run(name, robot)?,
                Action::ToWall => {
                    approach_wall(robot, &self.calibration.bands, &self.calibration.guard)?;
                }
            }
        }
        self.next += 1;
        Ok(self.next < self.steps.len())
    }
}

/// Wall follower for mazes nobody scripted
///
/// Every tick drives up to the wall ahead, then turns toward the open
/// side: right first, then left, otherwise turns around.
pub struct Explorer<'a> {
    calibration: &'a Calibration,
    open_cm: f32,
    max_moves: u32,
    moves: u32,
}

impl<'a> Explorer<'a> {
    pub fn new(calibration: &'a Calibration, open_cm: f32, max_moves: u32) -> Self {
        Self {
            calibration,
            open_cm,
            max_moves,
            moves: 0,
        }
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }
}

impl Behavior for Explorer<'_> {
    fn setup<H: Hardware, C: Clock>(&mut self, _robot: &mut Robot<H, C>) -> Result<()> {
        info!("Exploring: open side above {} cm, at most {} moves", self.open_cm, self.max_moves);
        Ok(())
    }

    fn tick<H: Hardware, C: Clock>(&mut self, robot: &mut Robot<H, C>) -> Result<bool> {
        let Calibration {
            primitives,
            bands,
            guard,
            ..
        } = self.calibration;

        match approach_wall(robot, bands, guard) {
            Ok(_) => {}
            Err(Error::TargetNotReached { last_distance_cm, .. }) => {
                // Long corridor: turn from wherever the guard stopped us
                warn!("Wall not reached ({:.1} cm left), choosing a turn anyway", last_distance_cm);
            }
            Err(e) => return Err(e),
        }

        let right = robot.read(Direction::Right)?.distance_cm;
        let left = robot.read(Direction::Left)?.distance_cm;

        if right > self.open_cm {
            info!("Right open ({:.0} cm), turning right", right);
            primitives.run(PrimitiveName::TurnRight, robot)?;
        } else if left > self.open_cm {
            info!("Left open ({:.0} cm), turning left", left);
            primitives.run(PrimitiveName::TurnLeft, robot)?;
        } else {
            info!("Dead end, turning around");
            primitives.run(PrimitiveName::TurnLeft, robot)?;
            primitives.run(PrimitiveName::TurnLeft, robot)?;
        }

        self.moves += 1;
        Ok(self.moves < self.max_moves)
    }

    fn shutdown<H: Hardware, C: Clock>(&mut self, _robot: &mut Robot<H, C>) -> Result<()> {
        info!("Explorer finished after {} moves", self.moves);
        Ok(())
    }
}
