// Runtime: wires a backend to a program and bridges telemetry to Zenoh
//
// The control program itself is strictly sequential and blocking, so it
// runs on one blocking thread. Zenoh I/O lives on the async side:
// - sonar readings are recorded into a `SonarFeed` the controller polls
// - actuation and health events flow out through an unbounded channel

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

// local imports
use crate::behavior::{BehaviorLoop, Explorer, Script};
use crate::cli::{Backend, Cli, Command};
use crate::config::{
    Calibration, SIM_ARENA_MM, SONAR_TIMEOUT, TOPIC_HEALTH, TOPIC_RT_DRIVE, TOPIC_SONAR,
};
use crate::error::{Error, Result};
use crate::hardware::{simulator, Arena, CreateBase, Pose, SimConfig, SonarFeed, WithSonar};
use crate::messages::{RobotEvent, SonarSample};
use crate::robot::{Clock, Hardware, Robot, SystemClock};
use crate::teleop;

fn zenoh_err(e: zenoh::Error) -> Error {
    Error::Zenoh(e.to_string())
}

pub async fn run(cli: Cli) -> Result<()> {
    let calibration = match &cli.calibration {
        Some(path) => Calibration::load(path)?,
        None => Calibration::default(),
    };

    if let Command::Calibration = cli.command {
        println!("{}", calibration.to_json()?);
        return Ok(());
    }

    let session = if cli.publish || cli.backend == Backend::Create {
        info!("Opening Zenoh session...");
        Some(zenoh::open(zenoh::Config::default()).await.map_err(zenoh_err)?)
    } else {
        None
    };

    let sonar = SonarFeed::new(SONAR_TIMEOUT);
    let mut telemetry = None;
    let mut publisher = None;
    let mut sonar_task = None;

    if let Some(session) = &session {
        let (tx, rx) = mpsc::unbounded_channel();
        telemetry = Some(tx);
        publisher = Some(tokio::spawn(publish_events(session.clone(), rx)));
        info!("Publishing to: {}, {}", TOPIC_RT_DRIVE, TOPIC_HEALTH);

        if cli.backend == Backend::Create {
            sonar_task = Some(tokio::spawn(feed_sonar(session.clone(), sonar.clone())));
        }
    }

    let program = tokio::task::spawn_blocking(move || run_program(cli, calibration, sonar, telemetry));
    let result = program
        .await
        .map_err(|e| Error::Hardware(format!("control thread failed: {e}")))?;

    if let Some(task) = sonar_task {
        task.abort();
    }
    // The robot (and its sender) is gone, so the publisher drains and ends
    if let Some(task) = publisher {
        match task.await {
            Ok(Err(e)) => warn!("Telemetry publisher failed: {}", e),
            Err(e) => warn!("Telemetry publisher task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    result
}

/// Build the backend and run the selected program on the blocking thread
fn run_program(
    cli: Cli,
    calibration: Calibration,
    sonar: SonarFeed,
    telemetry: Option<UnboundedSender<RobotEvent>>,
) -> Result<()> {
    match cli.backend {
        Backend::Sim => {
            let (width, height) = SIM_ARENA_MM;
            let start = Pose::new(width / 2.0, height / 2.0, 0.0);
            info!("Simulating {}x{} mm arena, start at {:?}", width, height, start);
            let (hw, clock) = simulator(SimConfig::default(), Arena::rectangle(width, height), start);
            execute(&cli.command, Robot::acquire(hw, clock), &calibration, telemetry)
        }
        Backend::Create => {
            let mut base = CreateBase::open(&cli.port)?;
            base.initialize()?;
            let robot = Robot::acquire(WithSonar::new(base, sonar), SystemClock::new());
            execute(&cli.command, robot, &calibration, telemetry)
        }
    }
}

fn execute<H: Hardware, C: Clock>(
    command: &Command,
    robot: Robot<H, C>,
    calibration: &Calibration,
    telemetry: Option<UnboundedSender<RobotEvent>>,
) -> Result<()> {
    let mut robot = robot.with_retries(calibration.retries);
    if let Some(telemetry) = telemetry {
        robot = robot.with_telemetry(telemetry);
    }

    match command {
        Command::Run { steps } => {
            let mut script = Script::parse(calibration, steps)?;
            let report = BehaviorLoop::unpaced().run(&mut robot, &mut script)?;
            info!("Script finished: {} steps", report.ticks);
            Ok(())
        }
        Command::Explore { max_moves, open_cm } => {
            let mut explorer = Explorer::new(calibration, *open_cm, *max_moves);
            let report = BehaviorLoop::new(calibration.pacing).run(&mut robot, &mut explorer)?;
            info!("Exploration finished: {} ticks", report.ticks);
            Ok(())
        }
        Command::Teleop => {
            let result = teleop::run(&mut robot, calibration);
            result.and(robot.release())
        }
        Command::Calibration => Ok(()),
    }
}

/// Forward robot events to Zenoh until the robot handle is dropped
async fn publish_events(session: zenoh::Session, mut events: UnboundedReceiver<RobotEvent>) -> Result<()> {
    let pub_drive = session.declare_publisher(TOPIC_RT_DRIVE).await.map_err(zenoh_err)?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await.map_err(zenoh_err)?;

    while let Some(event) = events.recv().await {
        match event {
            RobotEvent::Actuation(actuation) => {
                let json = serde_json::to_string(&actuation)?;
                pub_drive.put(json).await.map_err(zenoh_err)?;
            }
            RobotEvent::Health(health) => {
                let json = serde_json::to_string(&health)?;
                pub_health.put(json).await.map_err(zenoh_err)?;
            }
            RobotEvent::Sample(_) => {}
        }
    }
    Ok(())
}

/// Record every sonar reading published by the sensor node
async fn feed_sonar(session: zenoh::Session, feed: SonarFeed) -> Result<()> {
    let subscriber = session.declare_subscriber(TOPIC_SONAR).await.map_err(zenoh_err)?;
    info!("Subscribed to: {}", TOPIC_SONAR);

    while let Ok(sample) = subscriber.recv_async().await {
        let payload = sample.payload().to_bytes();
        match serde_json::from_slice::<SonarSample>(&payload) {
            Ok(reading) => feed.record(reading),
            Err(e) => warn!("Failed to parse sonar reading: {}", e),
        }
    }
    Ok(())
}
