// Differential-drive kinematics for a Create-style two-wheel base
// Converts drive commands to wheel speeds and integrates wheel speeds into a pose.

use std::f64::consts::PI;

use crate::motion::{DriveCommand, RADIUS_SPIN_LEFT, RADIUS_SPIN_RIGHT, RADIUS_STRAIGHT};

/// Distance between the two drive wheels of a Create base (mm)
pub const WHEEL_BASE_MM: f64 = 222.0;

/// Robot pose in the arena frame: millimeters, heading in radians (CCW from +x)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Heading wrapped to (-180, 180] degrees
    pub fn heading_deg(&self) -> f64 {
        normalize_angle(self.heading).to_degrees()
    }
}

/// Wrap an angle to (-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Wheel speeds (mm/s) that realize a drive command
///
/// Curves follow Create semantics: `speed` is the speed of the outer
/// wheel, positive radius turns left, radius 1 / -1 spins in place.
/// The turn rate is therefore `speed / (|radius| + wheel_base / 2)`.
pub fn command_to_wheels(command: DriveCommand, wheel_base: f64) -> (f64, f64) {
    match command {
        DriveCommand::Wheels { left, right } => (left as f64, right as f64),
        DriveCommand::Curve { speed, radius } => {
            let v = speed as f64;
            match radius {
                RADIUS_STRAIGHT => (v, v),
                RADIUS_SPIN_LEFT => (-v, v),
                RADIUS_SPIN_RIGHT => (v, -v),
                r => {
                    let r = r as f64;
                    let half = wheel_base / 2.0;
                    let center = v * r.abs() / (r.abs() + half);
                    (center * (r - half) / r, center * (r + half) / r)
                }
            }
        }
    }
}

/// Body velocities (mm/s, rad/s) from wheel speeds
pub fn wheels_to_body(left: f64, right: f64, wheel_base: f64) -> (f64, f64) {
    ((left + right) / 2.0, (right - left) / wheel_base)
}

/// Advance a pose by holding wheel speeds for `dt` seconds (exact arc)
pub fn integrate(pose: Pose, left: f64, right: f64, wheel_base: f64, dt: f64) -> Pose {
    let (v, omega) = wheels_to_body(left, right, wheel_base);
    let heading = pose.heading + omega * dt;

    if omega.abs() < 1e-9 {
        return Pose::new(
            pose.x + v * dt * pose.heading.cos(),
            pose.y + v * dt * pose.heading.sin(),
            heading,
        );
    }

    let radius = v / omega;
    Pose::new(
        pose.x + radius * (heading.sin() - pose.heading.sin()),
        pose.y - radius * (heading.cos() - pose.heading.cos()),
        heading,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_motion() {
        let pose = integrate(Pose::default(), 500.0, 500.0, WHEEL_BASE_MM, 1.642);
        assert!((pose.x - 821.0).abs() < 1e-6);
        assert!(pose.y.abs() < 1e-9);
        assert_eq!(pose.heading, 0.0);
    }

    #[test]
    fn test_spin_in_place_keeps_position() {
        let pose = integrate(Pose::default(), -400.0, 400.0, WHEEL_BASE_MM, 0.436);
        assert!(pose.x.abs() < 1e-9 && pose.y.abs() < 1e-9);
        // Quarter turn left for the calibrated duration
        assert!((pose.heading_deg() - 90.0).abs() < 0.5);
    }

    #[test]
    fn test_curve_outer_wheel_runs_at_speed() {
        let (left, right) = command_to_wheels(DriveCommand::Curve { speed: 500, radius: 417 }, WHEEL_BASE_MM);
        assert!(right > left, "positive radius should turn left");
        assert!((right - 500.0).abs() < 1e-9);
        assert!((left - 500.0 * 306.0 / 528.0).abs() < 1e-9);

        let (left, right) = command_to_wheels(DriveCommand::Curve { speed: 500, radius: -417 }, WHEEL_BASE_MM);
        assert!(left > right, "negative radius should turn right");
        assert!((left - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_curve_follows_circle() {
        let (left, right) = command_to_wheels(DriveCommand::Curve { speed: 500, radius: 1000 }, WHEEL_BASE_MM);
        // Quarter circle of radius 1000 mm; the center moves slower than the outer wheel
        let center = 500.0 * 1000.0 / (1000.0 + WHEEL_BASE_MM / 2.0);
        let dt = (PI / 2.0) * 1000.0 / center;
        let pose = integrate(Pose::default(), left, right, WHEEL_BASE_MM, dt);
        assert!((pose.x - 1000.0).abs() < 1e-6);
        assert!((pose.y - 1000.0).abs() < 1e-6);
        assert!((pose.heading_deg() - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_special_radii() {
        assert_eq!(
            command_to_wheels(DriveCommand::Curve { speed: 200, radius: RADIUS_STRAIGHT }, WHEEL_BASE_MM),
            (200.0, 200.0)
        );
        assert_eq!(
            command_to_wheels(DriveCommand::Curve { speed: 200, radius: RADIUS_SPIN_RIGHT }, WHEEL_BASE_MM),
            (200.0, -200.0)
        );
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);
    }
}
