// Fake sonar node: W/S move a virtual front wall, A/D the side walls, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serde_json::json;
use std::time::Duration;
use tracing::info;

const STEP_CM: f64 = 5.0;
const MIN_CM: f64 = 3.0;
const MAX_CM: f64 = 400.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publishers = [
        ("forward", session.declare_publisher("mazebot/sensor/sonar/forward").await?),
        ("left", session.declare_publisher("mazebot/sensor/sonar/left").await?),
        ("right", session.declare_publisher("mazebot/sensor/sonar/right").await?),
    ];

    info!("Controls: W/S=front wall closer/farther, A/D=side walls, Q=quit");

    enable_raw_mode()?;
    let result = run_sonar(&publishers).await;
    disable_raw_mode()?;

    result
}

async fn run_sonar(
    publishers: &[(&str, zenoh::pubsub::Publisher<'_>); 3],
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut front: f64 = 150.0;
    let mut sides: f64 = 40.0;

    loop {
        // Poll for key with 50ms timeout (20Hz effective rate)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind == KeyEventKind::Press || kind == KeyEventKind::Repeat {
                    match code {
                        KeyCode::Char('w') => front -= STEP_CM,
                        KeyCode::Char('s') => front += STEP_CM,
                        KeyCode::Char('a') => sides -= STEP_CM,
                        KeyCode::Char('d') => sides += STEP_CM,
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => {}
                    }
                    front = front.clamp(MIN_CM, MAX_CM);
                    sides = sides.clamp(MIN_CM, MAX_CM);
                    info!("Front: {:.0} cm, sides: {:.0} cm", front, sides);
                }
            }
        }

        // Publish every direction each cycle so the runtime watchdog stays fed
        for (direction, publisher) in publishers {
            let distance = if *direction == "forward" { front } else { sides };
            let reading = json!({ "direction": direction, "distance_cm": distance });
            publisher.put(reading.to_string()).await?;
        }
    }

    Ok(())
}
