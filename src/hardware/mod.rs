// Hardware backends for the maze robot
//
// Provides:
// - Create Open Interface serial driver (actuation)
// - Zenoh-fed sonar readings with a staleness watchdog (ranging)
// - Differential-drive simulator with virtual time
// - Scripted mock hardware for unit tests

pub mod create;
pub mod kinematics;
#[cfg(test)]
pub(crate) mod mock;
pub mod sim;
pub mod sonar;

pub use create::CreateBase;
pub use kinematics::Pose;
pub use sim::{simulator, Arena, SimClock, SimConfig, SimHardware};
pub use sonar::{SonarFeed, WithSonar};
