// Maze robot runtime: timed motion primitives, sonar wall approach and
// the behavior loop that sequences them, over a simulated or real base.

pub mod behavior;
pub mod cli;
pub mod config;
pub mod error;
pub mod hardware;
pub mod messages;
pub mod motion;
pub mod robot;
pub mod runtime;
pub mod teleop;

pub use error::{Error, Result};
