// Message types crossing the zenoh boundary

use serde::{Deserialize, Serialize};

use crate::control::kinematics::WheelPowers;
use crate::control::launcher::FlywheelCommand;

/// Gamepad snapshot from the driver station -> runtime.
///
/// Raw stick conventions follow the pad itself: pushing the left stick
/// forward reads negative `left_stick_y`. The control core does the sign
/// flip, not the publisher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct GamepadState {
    pub left_stick_x: f32,
    pub left_stick_y: f32,
    pub right_stick_x: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    /// Odometry pose reset.
    pub a: bool,
    /// Assist cancel override.
    pub b: bool,
    /// Fire request.
    pub x: bool,
    /// Target-lock hold.
    pub y: bool,
}

/// Best tag observation from the vision node -> runtime, one per frame.
///
/// When `visible` is false the pose fields are meaningless and must not be
/// consumed downstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TagObservation {
    pub visible: bool,
    /// Forward range to the tag, meters.
    pub forward_m: f32,
    /// Lateral offset, meters, positive left.
    pub lateral_m: f32,
    /// Tag yaw relative to the camera, radians.
    pub yaw_rad: f32,
}

/// Flywheel encoder velocity from the hardware node -> runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct FlywheelFeedback {
    pub ticks_per_s: f32,
}

/// Battery voltage sample from the hardware node -> runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatterySample {
    pub volts: f32,
}

/// Odometry pose from the tracking node -> runtime (optional feature).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PoseSample {
    pub x_m: f32,
    pub y_m: f32,
    pub heading_rad: f32,
}

/// Runtime -> odometry node: zero the pose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PoseReset {}

/// Drive actuation from runtime -> hardware node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct DriveActuation {
    pub front_left: f32,
    pub front_right: f32,
    pub back_left: f32,
    pub back_right: f32,
}

impl From<WheelPowers> for DriveActuation {
    fn from(powers: WheelPowers) -> Self {
        Self {
            front_left: powers.front_left,
            front_right: powers.front_right,
            back_left: powers.back_left,
            back_right: powers.back_right,
        }
    }
}

/// Launcher actuation from runtime -> hardware node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LauncherActuation {
    pub flywheel: FlywheelCommand,
    pub feeder: f32,
}

/// Best-effort haptic pulse, runtime -> driver station.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RumblePulse {
    pub duration_ms: u64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

/// Human-readable per-cycle report, runtime -> dashboards. Write-only: the
/// control logic never reads this back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub mode: String,
    pub launch_state: String,
    pub tag_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagObservation>,
    pub flywheel: FlywheelCommand,
    pub measured_rpm: f32,
    pub flywheel_ready: bool,
    pub battery_volts: f32,
    pub wheel_powers: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseSample>,
}
