use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mecabot_zenoh_runtime::config;
use mecabot_zenoh_runtime::control::cycle::ControlConfig;
use mecabot_zenoh_runtime::control::launcher::FlywheelMode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlywheelModeArg {
    /// Closed-loop velocity targets with encoder feedback
    Velocity,
    /// Open-loop power levels with a minimum RPM readiness floor
    Power,
}

#[derive(Parser, Debug)]
#[command(about = "Control runtime for the mecanum launcher bot")]
struct Args {
    /// Flywheel control mode
    #[arg(long, value_enum, default_value = "velocity")]
    flywheel_mode: FlywheelModeArg,

    /// Nominal battery voltage for compensation
    #[arg(long)]
    nominal_voltage: Option<f32>,

    /// Feeder run time per shot, milliseconds
    #[arg(long)]
    feed_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let mut control = ControlConfig::default();
    if let FlywheelModeArg::Power = args.flywheel_mode {
        control.launcher.mode = FlywheelMode::Power {
            low: 0.67,
            high: 1.0,
            min_ready_rpm: 2450.0,
        };
    }
    if let Some(volts) = args.nominal_voltage {
        control.nominal_voltage = volts;
    }
    if let Some(ms) = args.feed_ms {
        control.launcher.feed_time = Duration::from_millis(ms);
    }

    if let Err(e) = config::validate(&control) {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = mecabot_zenoh_runtime::runtime::run(control).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
