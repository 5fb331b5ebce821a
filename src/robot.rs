// Exclusive robot handle shared by primitives, the wall approach and the behavior loop
//
// The handle owns the hardware connection. It is acquired once and
// released exactly once: explicitly through `release`, or on drop.

use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::messages::{DriveActuation, RobotEvent, RuntimeHealth, SonarSample};
use crate::motion::{Direction, DriveCommand};

/// Actuator and ranging interface of one physical (or simulated) robot
pub trait Hardware {
    /// Set left and right wheel velocities (mm/s)
    fn set_velocities(&mut self, left: i16, right: i16) -> Result<()>;

    /// Drive along a circle (mm/s, mm; positive radius curves left)
    fn drive_curve(&mut self, speed: i16, radius: i16) -> Result<()>;

    /// Zero both wheel velocities
    fn stop(&mut self) -> Result<()>;

    /// Single-shot distance query in centimeters
    fn read_distance(&mut self, direction: Direction) -> Result<f32>;

    /// Return the base to its neutral state
    fn reset(&mut self) -> Result<()>;

    /// Release the connection
    fn close(&mut self) -> Result<()>;
}

/// Blocking pause used for primitive durations, band ticks and loop pacing
pub trait Clock {
    fn pause(&mut self, duration: Duration);

    /// Time since the clock was created
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time with `std::thread::sleep`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Receives every command, sample and health change of a robot handle
pub trait Telemetry {
    fn publish(&mut self, event: RobotEvent);
}

impl Telemetry for UnboundedSender<RobotEvent> {
    fn publish(&mut self, event: RobotEvent) {
        // Receiver gone means nobody is listening anymore; control continues
        let _ = self.send(event);
    }
}

/// Owned hardware handle
pub struct Robot<H: Hardware, C: Clock = SystemClock> {
    hw: H,
    clock: C,
    retries: u32,
    telemetry: Option<Box<dyn Telemetry + Send>>,
    released: bool,
}

impl<H: Hardware, C: Clock> Robot<H, C> {
    /// Take ownership of the hardware connection
    pub fn acquire(hw: H, clock: C) -> Self {
        info!("Hardware connection acquired");
        Self {
            hw,
            clock,
            retries: 0,
            telemetry: None,
            released: false,
        }
    }

    /// Retry failed actuator commands up to `retries` times, resetting in between
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_telemetry(mut self, telemetry: impl Telemetry + Send + 'static) -> Self {
        self.telemetry = Some(Box::new(telemetry));
        self
    }

    /// Issue a drive command (non-blocking)
    pub fn drive(&mut self, command: DriveCommand) -> Result<()> {
        self.ensure_connected()?;
        command.validate()?;
        debug!("Drive: {}", command);

        self.with_retry(|hw| match command {
            DriveCommand::Wheels { left, right } => hw.set_velocities(left, right),
            DriveCommand::Curve { speed, radius } => hw.drive_curve(speed, radius),
        })?;

        self.emit_actuation(Some(command));
        Ok(())
    }

    /// Zero both wheels. Stopping a stopped robot is a no-op for the base.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_connected()?;
        debug!("Stop");
        self.with_retry(|hw| hw.stop())?;
        self.emit_actuation(None);
        Ok(())
    }

    /// Block the control flow for `duration`
    pub fn pause(&mut self, duration: Duration) {
        self.clock.pause(duration);
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Read one sonar sample
    pub fn read(&mut self, direction: Direction) -> Result<SonarSample> {
        self.ensure_connected()?;
        let distance_cm = self.hw.read_distance(direction)?;
        let sample = SonarSample::new(direction, distance_cm);
        debug!("Sonar {}: {:.1} cm", direction, distance_cm);
        self.emit(RobotEvent::Sample(sample));
        Ok(sample)
    }

    pub fn report_health(&mut self, health: RuntimeHealth) {
        self.emit(RobotEvent::Health(health));
    }

    /// Stop, reset and close the connection
    ///
    /// Runs at most once; every step is attempted even if an earlier one
    /// fails, and the first failure is returned.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        info!("Releasing hardware connection");

        let stopped = self.hw.stop();
        if stopped.is_ok() {
            self.emit_actuation(None);
        }
        let reset = self.hw.reset();
        let closed = self.hw.close();
        self.emit(RobotEvent::Health(RuntimeHealth::Stopped));

        stopped.and(reset).and(closed)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.released {
            Err(Error::Released)
        } else {
            Ok(())
        }
    }

    fn with_retry(&mut self, mut op: impl FnMut(&mut H) -> Result<()>) -> Result<()> {
        let mut attempt = 0;
        loop {
            match op(&mut self.hw) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("Actuator command failed ({}), reset and retry {}/{}", e, attempt, self.retries);
                    self.hw.reset()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn emit_actuation(&mut self, command: Option<DriveCommand>) {
        let at_secs = self.clock.elapsed().as_secs_f64();
        self.emit(RobotEvent::Actuation(DriveActuation { command, at_secs }));
    }

    fn emit(&mut self, event: RobotEvent) {
        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.publish(event);
        }
    }
}

impl<H: Hardware, C: Clock> Drop for Robot<H, C> {
    fn drop(&mut self) {
        // Release on every exit path, including unwinding
        if let Err(e) = self.release() {
            warn!("Failed to release hardware on drop: {}", e);
        }
    }
}
