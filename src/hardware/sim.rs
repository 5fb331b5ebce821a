// Simulated differential-drive robot
//
// A virtual clock advances the world only when the control flow pauses,
// so programs run as fast as the CPU allows and deterministically.
// The arena is a set of wall segments; sonars ray-cast against them.
// There is no collision model: a robot driven into a wall passes through.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

use super::kinematics::{command_to_wheels, integrate, Pose, WHEEL_BASE_MM};
use crate::error::{Error, Result};
use crate::motion::{Direction, DriveCommand};
use crate::robot::{Clock, Hardware};

/// Wall segment in arena millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

/// Walls of the simulated world
#[derive(Debug, Clone, Default)]
pub struct Arena {
    walls: Vec<Wall>,
}

impl Arena {
    /// Closed rectangle with its corner at the origin
    pub fn rectangle(width_mm: f64, height_mm: f64) -> Self {
        let corners = [(0.0, 0.0), (width_mm, 0.0), (width_mm, height_mm), (0.0, height_mm)];
        let walls = (0..4)
            .map(|i| Wall {
                from: corners[i],
                to: corners[(i + 1) % 4],
            })
            .collect();
        Self { walls }
    }

    pub fn with_wall(mut self, from: (f64, f64), to: (f64, f64)) -> Self {
        self.walls.push(Wall { from, to });
        self
    }

    /// Distance (mm) along a ray to the nearest wall
    pub fn cast(&self, origin: (f64, f64), angle: f64) -> Option<f64> {
        let (dx, dy) = (angle.cos(), angle.sin());
        self.walls
            .iter()
            .filter_map(|wall| {
                let (ex, ey) = (wall.to.0 - wall.from.0, wall.to.1 - wall.from.1);
                let denom = dx * ey - dy * ex;
                if denom.abs() < 1e-12 {
                    return None;
                }
                let (wx, wy) = (wall.from.0 - origin.0, wall.from.1 - origin.1);
                let t = (wx * ey - wy * ex) / denom;
                let u = (wx * dy - wy * dx) / denom;
                (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
            })
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Physical parameters of the simulated robot
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub wheel_base_mm: f64,
    /// Sonar range limit (cm); open space reads as this value
    pub max_range_cm: f32,
    /// Extra time every pause actually takes, modelling scheduler latency
    pub pause_overshoot: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            wheel_base_mm: WHEEL_BASE_MM,
            max_range_cm: 400.0,
            pause_overshoot: Duration::ZERO,
        }
    }
}

struct World {
    config: SimConfig,
    arena: Arena,
    pose: Pose,
    wheels: (f64, f64),
    elapsed: Duration,
    connected: bool,
}

impl World {
    fn advance(&mut self, dt: Duration) {
        let (left, right) = self.wheels;
        self.pose = integrate(self.pose, left, right, self.config.wheel_base_mm, dt.as_secs_f64());
        self.elapsed += dt;
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::Hardware("simulator connection closed".to_string()))
        }
    }
}

/// Actuator and sonar side of the simulator
pub struct SimHardware {
    world: Rc<RefCell<World>>,
}

/// Virtual clock of the simulator
pub struct SimClock {
    world: Rc<RefCell<World>>,
}

/// Create a simulator with the robot at `start`
pub fn simulator(config: SimConfig, arena: Arena, start: Pose) -> (SimHardware, SimClock) {
    let world = Rc::new(RefCell::new(World {
        config,
        arena,
        pose: start,
        wheels: (0.0, 0.0),
        elapsed: Duration::ZERO,
        connected: true,
    }));
    (
        SimHardware {
            world: world.clone(),
        },
        SimClock { world },
    )
}

impl SimHardware {
    pub fn pose(&self) -> Pose {
        self.world.borrow().pose
    }

    pub fn wheels(&self) -> (f64, f64) {
        self.world.borrow().wheels
    }

    fn apply(&mut self, command: DriveCommand) -> Result<()> {
        let mut world = self.world.borrow_mut();
        world.ensure_connected()?;
        world.wheels = command_to_wheels(command, world.config.wheel_base_mm);
        Ok(())
    }
}

impl Hardware for SimHardware {
    fn set_velocities(&mut self, left: i16, right: i16) -> Result<()> {
        self.apply(DriveCommand::Wheels { left, right })
    }

    fn drive_curve(&mut self, speed: i16, radius: i16) -> Result<()> {
        self.apply(DriveCommand::Curve { speed, radius })
    }

    fn stop(&mut self) -> Result<()> {
        let mut world = self.world.borrow_mut();
        world.ensure_connected()?;
        world.wheels = (0.0, 0.0);
        Ok(())
    }

    fn read_distance(&mut self, direction: Direction) -> Result<f32> {
        let world = self.world.borrow();
        world.ensure_connected()?;
        let offset = match direction {
            Direction::Forward => 0.0,
            Direction::Left => std::f64::consts::FRAC_PI_2,
            Direction::Right => -std::f64::consts::FRAC_PI_2,
        };
        let max_cm = world.config.max_range_cm;
        let distance = world
            .arena
            .cast((world.pose.x, world.pose.y), world.pose.heading + offset)
            .map(|mm| ((mm / 10.0) as f32).min(max_cm))
            .unwrap_or(max_cm);
        Ok(distance)
    }

    fn reset(&mut self) -> Result<()> {
        self.stop()
    }

    fn close(&mut self) -> Result<()> {
        let mut world = self.world.borrow_mut();
        world.wheels = (0.0, 0.0);
        world.connected = false;
        debug!("Simulator closed at pose {:?}", world.pose);
        Ok(())
    }
}

impl Clock for SimClock {
    fn pause(&mut self, duration: Duration) {
        let mut world = self.world.borrow_mut();
        let actual = duration + world.config.pause_overshoot;
        world.advance(actual);
    }

    fn elapsed(&self) -> Duration {
        self.world.borrow().elapsed
    }
}
