// Timeouts, topics, control parameter validation
use std::time::Duration;

use crate::control::cycle::ControlConfig;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Gamepad snapshot timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// A tag observation older than this is treated as not visible
pub const TAG_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_GAMEPAD: &str = "mecabot/cmd/gamepad"; // driver input
pub const TOPIC_SENSE_TAGS: &str = "mecabot/sense/tags"; // vision detections
pub const TOPIC_SENSE_FLYWHEEL: &str = "mecabot/sense/flywheel"; // encoder velocity
pub const TOPIC_SENSE_BATTERY: &str = "mecabot/sense/battery"; // battery volts
pub const TOPIC_SENSE_POSE: &str = "mecabot/sense/pose"; // odometry (optional)
pub const TOPIC_RT_DRIVE: &str = "mecabot/rt/drive"; // wheel powers
pub const TOPIC_RT_LAUNCHER: &str = "mecabot/rt/launcher"; // flywheel + feeder
pub const TOPIC_RT_RUMBLE: &str = "mecabot/rt/rumble"; // haptic pulses
pub const TOPIC_RT_POSE_RESET: &str = "mecabot/rt/pose_reset"; // odometry zeroing
pub const TOPIC_STATE_STATUS: &str = "mecabot/state/status"; // per-cycle report
pub const TOPIC_STATE_HEALTH: &str = "mecabot/state/health"; // health status

/// Rejected control parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("feed time must be nonzero")]
    ZeroFeedTime,
}

/// Sanity-check a control configuration before the loop starts. Catches the
/// mistakes that would otherwise surface as a robot lurching on enable.
pub fn validate(config: &ControlConfig) -> Result<(), ConfigError> {
    fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
        if value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::NonPositive { name, value })
        }
    }
    fn unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::OutOfUnitRange { name, value })
        }
    }

    positive("nominal voltage", config.nominal_voltage)?;
    positive("minimum voltage", config.min_voltage)?;
    unit("slow factor", config.slow_factor)?;
    unit("feed power", config.launcher.feed_power)?;
    unit("trigger low threshold", config.launcher.trigger_low)?;
    unit("trigger high threshold", config.launcher.trigger_high)?;
    if config.launcher.feed_time.is_zero() {
        return Err(ConfigError::ZeroFeedTime);
    }

    let assist = &config.assist;
    unit("engagement deadband", assist.engage_deadband)?;
    unit("nudge scale", assist.nudge_scale)?;
    positive("approach kP", assist.approach.kp)?;
    positive("approach rotation kP", assist.approach.kp_rotate)?;
    positive("approach max speed", assist.approach.max_speed)?;
    positive("approach max rotation", assist.approach.max_rotate)?;
    positive("align rotation kP", assist.align.kp_rotate)?;
    positive("align max rotation", assist.align.max_rotate)?;
    Ok(())
}
