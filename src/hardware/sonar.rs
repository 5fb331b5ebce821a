// Sonar readings delivered by a separate sensor node
//
// The runtime's subscriber records every incoming reading; the control
// thread reads the newest one per direction. A watchdog rejects readings
// that are too old, so a dead sensor node fails the read instead of
// leaving the controller driving on a frozen distance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{Error, Result};
use crate::messages::SonarSample;
use crate::motion::Direction;
use crate::robot::Hardware;

/// Latest reading per direction, shared between subscriber and controller
#[derive(Debug, Clone)]
pub struct SonarFeed {
    latest: Arc<Mutex<HashMap<Direction, (f32, Instant)>>>,
    max_age: Duration,
}

impl SonarFeed {
    pub fn new(max_age: Duration) -> Self {
        Self {
            latest: Arc::new(Mutex::new(HashMap::new())),
            max_age,
        }
    }

    pub fn record(&self, sample: SonarSample) {
        self.record_at(sample, Instant::now());
    }

    pub fn record_at(&self, sample: SonarSample, at: Instant) {
        match self.latest.lock() {
            Ok(mut latest) => {
                latest.insert(sample.direction, (sample.distance_cm, at));
            }
            Err(_) => warn!("Sonar feed lock poisoned, dropping reading"),
        }
    }

    /// Newest reading for `direction`, if it is fresh enough
    pub fn latest(&self, direction: Direction) -> Result<f32> {
        self.latest_at(direction, Instant::now())
    }

    fn latest_at(&self, direction: Direction, now: Instant) -> Result<f32> {
        let latest = self
            .latest
            .lock()
            .map_err(|_| Error::Hardware("sonar feed lock poisoned".to_string()))?;
        let &(distance, at) = latest
            .get(&direction)
            .ok_or(Error::SensorUnavailable { direction })?;
        let age = now.saturating_duration_since(at);
        if age > self.max_age {
            return Err(Error::SensorStale { direction, age });
        }
        Ok(distance)
    }
}

/// An actuator-only base combined with a sonar feed
pub struct WithSonar<B: Hardware> {
    base: B,
    sonar: SonarFeed,
}

impl<B: Hardware> WithSonar<B> {
    pub fn new(base: B, sonar: SonarFeed) -> Self {
        Self { base, sonar }
    }

    pub fn base(&self) -> &B {
        &self.base
    }
}

impl<B: Hardware> Hardware for WithSonar<B> {
    fn set_velocities(&mut self, left: i16, right: i16) -> Result<()> {
        self.base.set_velocities(left, right)
    }

    fn drive_curve(&mut self, speed: i16, radius: i16) -> Result<()> {
        self.base.drive_curve(speed, radius)
    }

    fn stop(&mut self) -> Result<()> {
        self.base.stop()
    }

    fn read_distance(&mut self, direction: Direction) -> Result<f32> {
        self.sonar.latest(direction)
    }

    fn reset(&mut self) -> Result<()> {
        self.base.reset()
    }

    fn close(&mut self) -> Result<()> {
        self.base.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{Call, MockHardware};

    #[test]
    fn test_no_reading_yet() {
        let feed = SonarFeed::new(Duration::from_millis(250));
        assert!(matches!(
            feed.latest(Direction::Forward),
            Err(Error::SensorUnavailable { direction: Direction::Forward })
        ));
    }

    #[test]
    fn test_latest_reading_wins() {
        let feed = SonarFeed::new(Duration::from_millis(250));
        feed.record(SonarSample::new(Direction::Left, 120.0));
        feed.record(SonarSample::new(Direction::Left, 118.0));
        feed.record(SonarSample::new(Direction::Right, 40.0));
        assert_eq!(feed.latest(Direction::Left).unwrap(), 118.0);
        assert_eq!(feed.latest(Direction::Right).unwrap(), 40.0);
    }

    #[test]
    fn test_stale_reading_is_rejected() {
        let feed = SonarFeed::new(Duration::from_millis(250));
        let at = Instant::now();
        feed.record_at(SonarSample::new(Direction::Forward, 90.0), at);

        assert_eq!(
            feed.latest_at(Direction::Forward, at + Duration::from_millis(200)).unwrap(),
            90.0
        );
        assert!(matches!(
            feed.latest_at(Direction::Forward, at + Duration::from_millis(300)),
            Err(Error::SensorStale { .. })
        ));
    }

    #[test]
    fn test_with_sonar_splits_actuation_and_ranging() {
        let feed = SonarFeed::new(Duration::from_secs(1));
        feed.record(SonarSample::new(Direction::Forward, 75.0));
        let mut hw = WithSonar::new(MockHardware::new(), feed.clone());

        hw.set_velocities(200, 200).unwrap();
        assert_eq!(hw.read_distance(Direction::Forward).unwrap(), 75.0);
        hw.close().unwrap();

        assert_eq!(hw.base().calls(), vec![Call::Wheels(200, 200), Call::Close]);
    }
}
