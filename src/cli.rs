// Command line for the maze robot runtime
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CREATE_PORT;

/// Drive a differential-drive robot through a grid maze
#[derive(Parser, Debug)]
#[command(name = "mazebot-runtime")]
#[command(about = "Timed motion primitives and sonar wall approach for a maze robot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Hardware backend
    #[arg(long, value_enum, default_value_t = Backend::Sim, global = true)]
    pub backend: Backend,

    /// Serial port of the Create base
    #[arg(long, default_value = CREATE_PORT, global = true)]
    pub port: String,

    /// Calibration JSON overriding the built-in tables
    #[arg(long, global = true)]
    pub calibration: Option<PathBuf>,

    /// Publish actuation and health over Zenoh (always on with the Create backend)
    #[arg(long, global = true)]
    pub publish: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a maze script, e.g. `run forward*2 turn-left to-wall curve-right`
    Run {
        #[arg(required = true)]
        steps: Vec<String>,
    },

    /// Follow walls through an unknown maze
    Explore {
        /// Stop after this many wall-to-wall moves
        #[arg(long, default_value_t = 20)]
        max_moves: u32,

        /// A side sonar reading above this counts as an opening (cm)
        #[arg(long, default_value_t = 100.0)]
        open_cm: f32,
    },

    /// Drive one primitive per key press
    Teleop,

    /// Print the active calibration as JSON
    Calibration,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Simulated robot in a rectangular arena
    Sim,
    /// iRobot Create over serial, sonar over Zenoh
    Create,
}
