// Keyboard teleop: W forward, A/D turn, Q/E curve, T drive to wall, Esc quit
//
// Each key runs one whole primitive; keys pressed meanwhile are dropped
// so the robot does not replay a backlog after a long move.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tracing::{info, warn};

use crate::behavior::Action;
use crate::config::Calibration;
use crate::error::{Error, Result};
use crate::motion::{approach_wall, PrimitiveName};
use crate::robot::{Clock, Hardware, Robot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Run(Action),
    Quit,
}

/// Map a key code to what it does
pub fn key_action(code: KeyCode) -> Option<Key> {
    let action = match code {
        KeyCode::Char('w') => Action::Primitive(PrimitiveName::Forward),
        KeyCode::Char('a') => Action::Primitive(PrimitiveName::TurnLeft),
        KeyCode::Char('d') => Action::Primitive(PrimitiveName::TurnRight),
        KeyCode::Char('q') => Action::Primitive(PrimitiveName::CurveLeft),
        KeyCode::Char('e') => Action::Primitive(PrimitiveName::CurveRight),
        KeyCode::Char('t') => Action::ToWall,
        KeyCode::Esc | KeyCode::Char('x') => return Some(Key::Quit),
        _ => return None,
    };
    Some(Key::Run(action))
}

/// Run teleop until Esc; the terminal is restored on every exit path
pub fn run<H: Hardware, C: Clock>(robot: &mut Robot<H, C>, calibration: &Calibration) -> Result<()> {
    info!("Controls: W=forward, A/D=turn, Q/E=curve, T=to wall, Esc=quit");

    enable_raw_mode()?;
    let result = drive_from_keys(robot, calibration);
    disable_raw_mode()?;

    result
}

fn drive_from_keys<H: Hardware, C: Clock>(robot: &mut Robot<H, C>, calibration: &Calibration) -> Result<()> {
    loop {
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        match key_action(code) {
            Some(Key::Quit) => return Ok(()),
            Some(Key::Run(Action::Primitive(name))) => calibration.primitives.run(name, robot)?,
            Some(Key::Run(Action::ToWall)) => {
                match approach_wall(robot, &calibration.bands, &calibration.guard) {
                    Ok(report) => info!("At wall: {:.1} cm", report.final_distance_cm),
                    // Keep driving by hand after a failed approach
                    Err(e @ (Error::TargetNotReached { .. } | Error::InvalidSample { .. })) => {
                        warn!("Approach aborted: {}", e)
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {}
        }

        // Drop keys queued while the primitive was running
        while event::poll(Duration::ZERO)? {
            let _ = event::read()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_map() {
        assert_eq!(
            key_action(KeyCode::Char('w')),
            Some(Key::Run(Action::Primitive(PrimitiveName::Forward)))
        );
        assert_eq!(
            key_action(KeyCode::Char('d')),
            Some(Key::Run(Action::Primitive(PrimitiveName::TurnRight)))
        );
        assert_eq!(key_action(KeyCode::Char('t')), Some(Key::Run(Action::ToWall)));
        assert_eq!(key_action(KeyCode::Esc), Some(Key::Quit));
        assert_eq!(key_action(KeyCode::Char('z')), None);
    }
}
