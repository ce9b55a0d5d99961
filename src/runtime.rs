// 50 Hz control loop with watchdog
//
// The loop never blocks on hardware: every external input arrives over
// zenoh and is drained non-blocking at the top of each tick, every output
// is published right after the control core runs. If the driver station
// stops sending gamepad snapshots, the watchdog substitutes a neutral
// snapshot so the drivetrain stops and the launcher spins down through its
// normal transitions.

use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{
    CMD_TIMEOUT, LOOP_HZ, TAG_TIMEOUT, TOPIC_CMD_GAMEPAD, TOPIC_RT_DRIVE, TOPIC_RT_LAUNCHER,
    TOPIC_RT_POSE_RESET, TOPIC_RT_RUMBLE, TOPIC_SENSE_BATTERY, TOPIC_SENSE_FLYWHEEL,
    TOPIC_SENSE_POSE, TOPIC_SENSE_TAGS, TOPIC_STATE_HEALTH, TOPIC_STATE_STATUS,
};
use crate::control::cycle::{ControlConfig, ControlCore, InputSnapshot};
use crate::messages::{
    BatterySample, DriveActuation, FlywheelFeedback, GamepadState, LauncherActuation, PoseReset,
    PoseSample, RumblePulse, RuntimeHealth, StatusReport, TagObservation,
};

pub struct Runtime {
    core: ControlCore,
    latest_gamepad: Option<GamepadState>,
    gamepad_received_at: Instant,
    latest_tag: Option<(TagObservation, Instant)>,
    latest_flywheel: FlywheelFeedback,
    latest_battery: Option<BatterySample>,
    latest_pose: Option<PoseSample>,
    health: RuntimeHealth,
    prev_reset_button: bool,
}

impl Runtime {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            core: ControlCore::new(config),
            latest_gamepad: None,
            gamepad_received_at: Instant::now(),
            latest_tag: None,
            latest_flywheel: FlywheelFeedback::default(),
            latest_battery: None,
            latest_pose: None,
            health: RuntimeHealth::CmdStale, // Start stale until first snapshot
            prev_reset_button: false,
        }
    }

    fn on_gamepad(&mut self, gamepad: GamepadState) {
        self.latest_gamepad = Some(gamepad);
        self.gamepad_received_at = Instant::now();
    }

    fn on_tag(&mut self, tag: TagObservation) {
        self.latest_tag = Some((tag, Instant::now()));
    }

    fn on_flywheel(&mut self, feedback: FlywheelFeedback) {
        self.latest_flywheel = feedback;
    }

    fn on_battery(&mut self, sample: BatterySample) {
        self.latest_battery = Some(sample);
    }

    fn on_pose(&mut self, pose: PoseSample) {
        self.latest_pose = Some(pose);
    }

    /// Assemble this cycle's immutable input snapshot, applying the
    /// watchdog and staleness rules.
    fn snapshot(&mut self, now: Instant) -> InputSnapshot {
        let gamepad_age = now.duration_since(self.gamepad_received_at);
        let gamepad = match self.latest_gamepad {
            Some(gamepad) if gamepad_age <= CMD_TIMEOUT => {
                self.health = RuntimeHealth::Ok;
                gamepad
            }
            _ => {
                // Watchdog triggered - neutral inputs stop the robot
                if self.health != RuntimeHealth::CmdStale {
                    warn!("Gamepad stale ({:?} old), stopping robot", gamepad_age);
                }
                self.health = RuntimeHealth::CmdStale;
                GamepadState::default()
            }
        };

        // A tag sample that stopped refreshing is no tag at all.
        let tag = match self.latest_tag {
            Some((tag, at)) if now.duration_since(at) <= TAG_TIMEOUT => tag,
            _ => TagObservation::default(),
        };

        // No battery sample yet: assume nominal so the ratio stays 1.0.
        let battery_volts = self
            .latest_battery
            .map(|s| s.volts)
            .unwrap_or(self.core.config().nominal_voltage);

        InputSnapshot {
            gamepad,
            tag,
            flywheel_ticks_per_s: self.latest_flywheel.ticks_per_s,
            battery_volts,
        }
    }
}

pub async fn run(config: ControlConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_gamepad = session.declare_subscriber(TOPIC_CMD_GAMEPAD).await?;
    let sub_tags = session.declare_subscriber(TOPIC_SENSE_TAGS).await?;
    let sub_flywheel = session.declare_subscriber(TOPIC_SENSE_FLYWHEEL).await?;
    let sub_battery = session.declare_subscriber(TOPIC_SENSE_BATTERY).await?;
    let pub_drive = session.declare_publisher(TOPIC_RT_DRIVE).await?;
    let pub_launcher = session.declare_publisher(TOPIC_RT_LAUNCHER).await?;
    let pub_rumble = session.declare_publisher(TOPIC_RT_RUMBLE).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_STATUS).await?;
    let pub_health = session.declare_publisher(TOPIC_STATE_HEALTH).await?;

    // Odometry is optional: losing it costs the pose readout, never drive
    // or launcher control.
    let odometry = match session.declare_subscriber(TOPIC_SENSE_POSE).await {
        Ok(sub) => match session.declare_publisher(TOPIC_RT_POSE_RESET).await {
            Ok(pub_reset) => Some((sub, pub_reset)),
            Err(e) => {
                warn!("Odometry disabled (reset publisher failed): {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Odometry disabled (pose subscriber failed): {}", e);
            None
        }
    };

    let mut runtime = Runtime::new(config);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, odometry {}",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        if odometry.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!("Subscribed to: {}", TOPIC_CMD_GAMEPAD);
    info!("Publishing to: {}, {}", TOPIC_RT_DRIVE, TOPIC_RT_LAUNCHER);

    loop {
        tick.tick().await;

        // 1. Drain all pending samples (non-blocking), keep latest of each
        while let Ok(Some(sample)) = sub_gamepad.try_recv() {
            match serde_json::from_slice::<GamepadState>(&sample.payload().to_bytes()) {
                Ok(gamepad) => runtime.on_gamepad(gamepad),
                Err(e) => warn!("Failed to parse gamepad snapshot: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_tags.try_recv() {
            match serde_json::from_slice::<TagObservation>(&sample.payload().to_bytes()) {
                Ok(tag) => runtime.on_tag(tag),
                Err(e) => warn!("Failed to parse tag observation: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_flywheel.try_recv() {
            match serde_json::from_slice::<FlywheelFeedback>(&sample.payload().to_bytes()) {
                Ok(feedback) => runtime.on_flywheel(feedback),
                Err(e) => warn!("Failed to parse flywheel feedback: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_battery.try_recv() {
            match serde_json::from_slice::<BatterySample>(&sample.payload().to_bytes()) {
                Ok(battery) => runtime.on_battery(battery),
                Err(e) => warn!("Failed to parse battery sample: {}", e),
            }
        }
        if let Some((sub_pose, _)) = &odometry {
            while let Ok(Some(sample)) = sub_pose.try_recv() {
                match serde_json::from_slice::<PoseSample>(&sample.payload().to_bytes()) {
                    Ok(pose) => runtime.on_pose(pose),
                    Err(e) => warn!("Failed to parse pose sample: {}", e),
                }
            }
        }

        // 2. One immutable snapshot, one control cycle
        let now = Instant::now();
        let snapshot = runtime.snapshot(now);
        let output = runtime.core.cycle(&snapshot, now);

        // 3. Actuation
        let drive = DriveActuation::from(output.drive);
        pub_drive.put(serde_json::to_string(&drive)?).await?;
        let launcher = LauncherActuation {
            flywheel: output.launcher.flywheel,
            feeder: output.launcher.feeder_power,
        };
        pub_launcher.put(serde_json::to_string(&launcher)?).await?;

        // 4. Haptics are best-effort: a failed pulse is dropped, never
        // retried, never allowed to take the loop down
        if let Some(duration_ms) = output.rumble_ms {
            let pulse = RumblePulse { duration_ms };
            if let Err(e) = pub_rumble.put(serde_json::to_string(&pulse)?).await {
                debug!("Rumble pulse dropped: {}", e);
            }
        }

        // 5. Odometry reset on button edge
        if let Some((_, pub_reset)) = &odometry {
            if snapshot.gamepad.a && !runtime.prev_reset_button {
                if let Err(e) = pub_reset.put(serde_json::to_string(&PoseReset {})?).await {
                    warn!("Pose reset request failed: {}", e);
                }
            }
        }
        runtime.prev_reset_button = snapshot.gamepad.a;

        // 6. Status report and health
        let status = StatusReport {
            pose: runtime.latest_pose,
            ..output.status
        };
        pub_status.put(serde_json::to_string(&status)?).await?;
        pub_health.put(serde_json::to_string(&runtime.health)?).await?;
    }
}
