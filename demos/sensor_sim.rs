// Bench sensor simulator
//
// Stands in for the hardware and vision nodes so the runtime can be
// exercised end-to-end on a desk: subscribes to the launcher actuation and
// runs a first-order flywheel model against it, publishes battery voltage
// that sags under flywheel load, and publishes a fixed tag observation the
// assist modes can chase.
//
// Usage: cargo run --example sensor_sim -- --tag-forward 2.0 --tag-yaw 0.2

use std::time::Duration;

use clap::Parser;
use tracing::info;

use mecabot_zenoh_runtime::config::{
    TOPIC_RT_LAUNCHER, TOPIC_SENSE_BATTERY, TOPIC_SENSE_FLYWHEEL, TOPIC_SENSE_TAGS,
};
use mecabot_zenoh_runtime::control::launcher::{rpm_to_ticks_per_s, FlywheelCommand};
use mecabot_zenoh_runtime::messages::{
    BatterySample, FlywheelFeedback, LauncherActuation, TagObservation,
};

const SIM_HZ: u64 = 50;
/// First-order spin-up time constant, seconds.
const FLYWHEEL_TAU: f32 = 0.4;
/// RPM an open-loop power of 1.0 settles at.
const RPM_PER_UNIT_POWER: f32 = 4000.0;

#[derive(Parser, Debug)]
#[command(about = "Synthetic tag/flywheel/battery publisher for bench runs")]
struct Args {
    /// Tag forward range, meters
    #[arg(long, default_value_t = 2.0)]
    tag_forward: f32,

    /// Tag lateral offset, meters
    #[arg(long, default_value_t = 0.15)]
    tag_lateral: f32,

    /// Tag yaw, radians
    #[arg(long, default_value_t = 0.1)]
    tag_yaw: f32,

    /// Publish no tag at all (manual-only bench)
    #[arg(long)]
    no_tag: bool,

    /// Resting battery voltage
    #[arg(long, default_value_t = 12.6)]
    volts: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let sub_launcher = session.declare_subscriber(TOPIC_RT_LAUNCHER).await?;
    let pub_flywheel = session.declare_publisher(TOPIC_SENSE_FLYWHEEL).await?;
    let pub_battery = session.declare_publisher(TOPIC_SENSE_BATTERY).await?;
    let pub_tags = session.declare_publisher(TOPIC_SENSE_TAGS).await?;

    info!(
        "Simulating at {}Hz: tag {}, battery {:.1}V",
        SIM_HZ,
        if args.no_tag { "hidden" } else { "visible" },
        args.volts
    );

    let mut tick = tokio::time::interval(Duration::from_millis(1000 / SIM_HZ));
    let dt = 1.0 / SIM_HZ as f32;
    let alpha = dt / FLYWHEEL_TAU;

    let mut measured_ticks_per_s: f32 = 0.0;
    let mut commanded = FlywheelCommand::Velocity(0.0);

    loop {
        tick.tick().await;

        while let Ok(Some(sample)) = sub_launcher.try_recv() {
            if let Ok(actuation) =
                serde_json::from_slice::<LauncherActuation>(&sample.payload().to_bytes())
            {
                commanded = actuation.flywheel;
            }
        }

        // First-order lag toward the commanded operating point.
        let target_ticks_per_s = match commanded {
            FlywheelCommand::Velocity(v) => v,
            FlywheelCommand::Power(p) => rpm_to_ticks_per_s(p * RPM_PER_UNIT_POWER),
        };
        measured_ticks_per_s += (target_ticks_per_s - measured_ticks_per_s) * alpha;

        let feedback = FlywheelFeedback {
            ticks_per_s: measured_ticks_per_s,
        };
        pub_flywheel.put(serde_json::to_string(&feedback)?).await?;

        // The pack sags roughly half a volt at full flywheel load.
        let load = (measured_ticks_per_s / rpm_to_ticks_per_s(RPM_PER_UNIT_POWER)).abs();
        let battery = BatterySample {
            volts: args.volts - 0.5 * load,
        };
        pub_battery.put(serde_json::to_string(&battery)?).await?;

        if !args.no_tag {
            let tag = TagObservation {
                visible: true,
                forward_m: args.tag_forward,
                lateral_m: args.tag_lateral,
                yaw_rad: args.tag_yaw,
            };
            pub_tags.put(serde_json::to_string(&tag)?).await?;
        }
    }
}
