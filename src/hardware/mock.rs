// Scripted in-memory hardware for unit testing

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::motion::Direction;
use crate::robot::{Clock, Hardware};

/// One recorded interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Wheels(i16, i16),
    Curve(i16, i16),
    Stop,
    Read(Direction),
    Reset,
    Close,
    Pause(Duration),
}

/// Mock hardware recording every call
///
/// Distances are scripted per direction. The last scripted value keeps
/// being returned once the queue is down to one element.
pub struct MockHardware {
    log: Arc<Mutex<Vec<Call>>>,
    distances: HashMap<Direction, VecDeque<f32>>,
    velocities: (i16, i16),
    failing_drives: u32,
    failing_stops: u32,
    closes: Arc<AtomicUsize>,
}

impl MockHardware {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            distances: HashMap::new(),
            velocities: (0, 0),
            failing_drives: 0,
            failing_stops: 0,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A clock whose pauses are recorded in this hardware's call log
    pub fn clock(&self) -> ManualClock {
        ManualClock {
            log: self.log.clone(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn push_distances(&mut self, direction: Direction, values: impl IntoIterator<Item = f32>) {
        self.distances.entry(direction).or_default().extend(values);
    }

    pub fn fail_next_drives(&mut self, count: u32) {
        self.failing_drives = count;
    }

    pub fn fail_next_stops(&mut self, count: u32) {
        self.failing_stops = count;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    /// Calls without pauses and sonar reads
    pub fn commands(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Pause(_) | Call::Read(_)))
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.log.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn velocities(&self) -> (i16, i16) {
        self.velocities
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    fn drive_fault(&mut self) -> Result<()> {
        if self.failing_drives > 0 {
            self.failing_drives -= 1;
            return Err(Error::Hardware("mock actuator unreachable".to_string()));
        }
        Ok(())
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl Hardware for MockHardware {
    fn set_velocities(&mut self, left: i16, right: i16) -> Result<()> {
        self.drive_fault()?;
        self.record(Call::Wheels(left, right));
        self.velocities = (left, right);
        Ok(())
    }

    fn drive_curve(&mut self, speed: i16, radius: i16) -> Result<()> {
        self.drive_fault()?;
        self.record(Call::Curve(speed, radius));
        self.velocities = (speed, speed);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.failing_stops > 0 {
            self.failing_stops -= 1;
            return Err(Error::Hardware("mock stop failed".to_string()));
        }
        self.record(Call::Stop);
        self.velocities = (0, 0);
        Ok(())
    }

    fn read_distance(&mut self, direction: Direction) -> Result<f32> {
        self.record(Call::Read(direction));
        let queue = self
            .distances
            .get_mut(&direction)
            .ok_or(Error::SensorUnavailable { direction })?;
        let value = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        value.ok_or(Error::SensorUnavailable { direction })
    }

    fn reset(&mut self) -> Result<()> {
        self.record(Call::Reset);
        self.velocities = (0, 0);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.record(Call::Close);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Clock that only records pauses
pub struct ManualClock {
    log: Arc<Mutex<Vec<Call>>>,
    elapsed: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            elapsed: Duration::ZERO,
        }
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Pause(d) => Some(*d),
                _ => None,
            })
            .collect()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn pause(&mut self, duration: Duration) {
        self.log.lock().unwrap().push(Call::Pause(duration));
        self.elapsed += duration;
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
