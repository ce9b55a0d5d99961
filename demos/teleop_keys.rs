// Keyboard teleop: WASD move, Q/E rotate, hold-keys for triggers/buttons
//
// Publishes GamepadState snapshots at ~50Hz so the runtime can be driven
// from a laptop without a real gamepad. Terminal key events have no
// release notification, so every "held" input decays after a short timeout
// with no repeat - tap or hold the key to keep it active.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use mecabot_zenoh_runtime::config::TOPIC_CMD_GAMEPAD;
use mecabot_zenoh_runtime::messages::GamepadState;

const STICK_STEPS: [f32; 3] = [0.3, 0.6, 1.0];
const INPUT_TIMEOUT_MS: u64 = 150; // Inputs decay after this much time with no repeat

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_GAMEPAD).await?;

    info!("Controls: WASD=move, Q/E=rotate, 1/2/3=stick scale");
    info!("          F=flywheel low, G=flywheel high, SPACE=fire, L=lock, C=cancel, O=pose reset");
    info!("          V=slow mode, ESC=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut scale_idx: usize = 1;

    // Persistent input state with per-input refresh timestamps
    let mut gamepad = GamepadState::default();
    let mut last_move = Instant::now();
    let mut last_trigger = Instant::now();
    let mut last_button = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                if !pressed {
                    continue;
                }
                let scale = STICK_STEPS[scale_idx];

                match code {
                    // Movement - forward is stick-up, which the pad reports negative
                    KeyCode::Char('w') => {
                        gamepad.left_stick_y = -scale;
                        last_move = Instant::now();
                    }
                    KeyCode::Char('s') => {
                        gamepad.left_stick_y = scale;
                        last_move = Instant::now();
                    }
                    KeyCode::Char('a') => {
                        gamepad.left_stick_x = -scale;
                        last_move = Instant::now();
                    }
                    KeyCode::Char('d') => {
                        gamepad.left_stick_x = scale;
                        last_move = Instant::now();
                    }
                    KeyCode::Char('q') => {
                        gamepad.right_stick_x = -scale;
                        last_move = Instant::now();
                    }
                    KeyCode::Char('e') => {
                        gamepad.right_stick_x = scale;
                        last_move = Instant::now();
                    }

                    // Triggers
                    KeyCode::Char('f') => {
                        gamepad.right_trigger = 0.5;
                        last_trigger = Instant::now();
                    }
                    KeyCode::Char('g') => {
                        gamepad.right_trigger = 1.0;
                        last_trigger = Instant::now();
                    }
                    KeyCode::Char('v') => {
                        gamepad.left_trigger = 1.0;
                        last_trigger = Instant::now();
                    }

                    // Buttons
                    KeyCode::Char(' ') => {
                        gamepad.x = true;
                        last_button = Instant::now();
                    }
                    KeyCode::Char('l') => {
                        gamepad.y = true;
                        last_button = Instant::now();
                    }
                    KeyCode::Char('c') => {
                        gamepad.b = true;
                        last_button = Instant::now();
                    }
                    KeyCode::Char('o') => {
                        gamepad.a = true;
                        last_button = Instant::now();
                    }

                    // Stick scale
                    KeyCode::Char('1') => {
                        scale_idx = 0;
                        print_scale(scale_idx);
                    }
                    KeyCode::Char('2') => {
                        scale_idx = 1;
                        print_scale(scale_idx);
                    }
                    KeyCode::Char('3') => {
                        scale_idx = 2;
                        print_scale(scale_idx);
                    }

                    KeyCode::Esc => break,

                    _ => {}
                }
            }
        }

        // Decay inputs that stopped repeating
        let timeout = Duration::from_millis(INPUT_TIMEOUT_MS);
        if last_move.elapsed() > timeout {
            gamepad.left_stick_x = 0.0;
            gamepad.left_stick_y = 0.0;
            gamepad.right_stick_x = 0.0;
        }
        if last_trigger.elapsed() > timeout {
            gamepad.left_trigger = 0.0;
            gamepad.right_trigger = 0.0;
        }
        if last_button.elapsed() > timeout {
            gamepad.a = false;
            gamepad.b = false;
            gamepad.x = false;
            gamepad.y = false;
        }

        // Always publish at ~50Hz
        publisher.put(serde_json::to_string(&gamepad)?).await?;
    }

    Ok(())
}

fn print_scale(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Stick scale: {}", label);
}
