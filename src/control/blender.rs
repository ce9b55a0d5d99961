// Steering blender
//
// Chooses between manual drive, vision-assisted approach, and target-lock
// alignment each cycle, then applies the uniform slow-mode and battery
// compensation scaling to whatever command comes out.

use crate::control::kinematics::DriveCommand;
use crate::control::vision::{AlignmentErrors, TargetGoal, TargetTracker};
use crate::messages::TagObservation;

/// Proportional gains and limits for the auto-approach mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachGains {
    pub kp: f32,
    pub kp_rotate: f32,
    /// Translation clamp at zero engagement depth; the effective limit
    /// shrinks as the trigger is pressed deeper.
    pub max_speed: f32,
    pub max_rotate: f32,
    pub forward_tolerance_m: f32,
    pub lateral_tolerance_m: f32,
    pub yaw_tolerance_rad: f32,
}

impl Default for ApproachGains {
    fn default() -> Self {
        Self {
            kp: 1.0,
            kp_rotate: 1.5,
            max_speed: 0.5,
            max_rotate: 0.4,
            forward_tolerance_m: 0.05,
            lateral_tolerance_m: 0.05,
            yaw_tolerance_rad: 0.05,
        }
    }
}

/// Gains and limits for the rotate/strafe target-lock mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignGains {
    pub kp_rotate: f32,
    pub max_rotate: f32,
    pub kp_strafe: f32,
    pub max_strafe: f32,
    /// 2 degrees.
    pub yaw_tolerance_rad: f32,
    pub lateral_tolerance_m: f32,
}

impl Default for AlignGains {
    fn default() -> Self {
        Self {
            kp_rotate: 1.2,
            max_rotate: 0.45,
            kp_strafe: 0.3,
            max_strafe: 0.5,
            yaw_tolerance_rad: 0.035,
            lateral_tolerance_m: 0.05,
        }
    }
}

/// Assist tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssistConfig {
    /// Engagement trigger deadband.
    pub engage_deadband: f32,
    /// Fraction of raw stick input layered on top of approach corrections.
    pub nudge_scale: f32,
    pub goal: TargetGoal,
    pub approach: ApproachGains,
    pub align: AlignGains,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            engage_deadband: 0.05,
            nudge_scale: 0.2,
            goal: TargetGoal::default(),
            approach: ApproachGains::default(),
            align: AlignGains::default(),
        }
    }
}

/// Which steering source won this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistMode {
    Manual,
    Approach,
    Align,
}

impl AssistMode {
    pub fn name(&self) -> &'static str {
        match self {
            AssistMode::Manual => "MANUAL",
            AssistMode::Approach => "APPROACH",
            AssistMode::Align => "TARGET_LOCK",
        }
    }
}

/// Driver inputs the blender reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendInput {
    pub manual: DriveCommand,
    /// Approach engagement trigger depth.
    pub engage: f32,
    /// Target-lock button held.
    pub lock_held: bool,
    /// Cancel override held: forces manual for this cycle.
    pub cancel: bool,
}

/// Command plus bookkeeping from one blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendOutput {
    pub command: DriveCommand,
    pub mode: AssistMode,
    /// One-shot pulse on lock acquisition.
    pub lock_pulse: bool,
}

fn clamp(value: f32, limit: f32) -> f32 {
    value.clamp(-limit, limit)
}

/// Pick the assist mode for this cycle. Align wins over approach; anything
/// without a visible tag falls through to manual.
pub fn select_mode(input: &BlendInput, obs: &TagObservation, config: &AssistConfig) -> AssistMode {
    if input.cancel || !obs.visible {
        AssistMode::Manual
    } else if input.lock_held {
        AssistMode::Align
    } else if input.engage > config.engage_deadband {
        AssistMode::Approach
    } else {
        AssistMode::Manual
    }
}

/// Blend manual intent with vision corrections.
///
/// The fallback to unmodified manual input is unconditional: no correction
/// computed on an earlier cycle survives into a cycle where the tag is gone
/// or the assist inputs are released.
pub fn blend(
    input: &BlendInput,
    obs: &TagObservation,
    tracker: &mut TargetTracker,
    config: &AssistConfig,
) -> BlendOutput {
    let mode = select_mode(input, obs, config);
    match mode {
        AssistMode::Manual => {
            tracker.clear();
            BlendOutput {
                command: input.manual,
                mode,
                lock_pulse: false,
            }
        }
        AssistMode::Approach => {
            let errors = AlignmentErrors::from_observation(obs, &config.goal);
            BlendOutput {
                command: approach_command(input, &errors, config),
                mode,
                lock_pulse: false,
            }
        }
        AssistMode::Align => {
            let errors = AlignmentErrors::from_observation(obs, &config.goal);
            let (command, lock_pulse) = align_command(input, &errors, tracker, &config.align);
            BlendOutput {
                command,
                mode,
                lock_pulse,
            }
        }
    }
}

/// Full 3-axis approach toward the goal pose. Deeper trigger = tighter
/// translation clamp for precise final positioning; inside all tolerances
/// the command snaps to exactly zero so the robot parks instead of hunting.
fn approach_command(
    input: &BlendInput,
    errors: &AlignmentErrors,
    config: &AssistConfig,
) -> DriveCommand {
    let gains = &config.approach;
    let in_tolerance = errors.forward_m.abs() <= gains.forward_tolerance_m
        && errors.lateral_m.abs() <= gains.lateral_tolerance_m
        && errors.yaw_rad.abs() <= gains.yaw_tolerance_rad;
    if in_tolerance {
        return DriveCommand::zero();
    }

    let speed_limit = gains.max_speed * (1.0 - input.engage).max(0.0);
    let nudge = input.manual.scaled(config.nudge_scale);

    DriveCommand::new(
        clamp(-errors.forward_m * gains.kp, speed_limit) + nudge.forward,
        clamp(-errors.lateral_m * gains.kp, speed_limit) + nudge.strafe,
        clamp(-errors.yaw_rad * gains.kp_rotate, gains.max_rotate) + nudge.rotate,
    )
}

/// Rotation/strafe alignment with manual forward. In-band axes are forced
/// to zero, and the lock latch pulses when both axes are inside tolerance.
fn align_command(
    input: &BlendInput,
    errors: &AlignmentErrors,
    tracker: &mut TargetTracker,
    gains: &AlignGains,
) -> (DriveCommand, bool) {
    let angle_aligned = errors.yaw_rad.abs() <= gains.yaw_tolerance_rad;
    let strafe_aligned = errors.lateral_m.abs() <= gains.lateral_tolerance_m;

    let rotate = if angle_aligned {
        0.0
    } else {
        clamp(-errors.yaw_rad * gains.kp_rotate, gains.max_rotate)
    };
    let strafe = if strafe_aligned {
        0.0
    } else {
        clamp(-errors.lateral_m * gains.kp_strafe, gains.max_strafe)
    };

    let pulse = tracker.update(angle_aligned && strafe_aligned);
    (
        DriveCommand::new(input.manual.forward, strafe, rotate),
        pulse,
    )
}

/// Battery compensation ratio. Exactly 1.0 at nominal voltage; the
/// denominator is floored so a dead or disconnected sensor can never blow
/// the ratio up to infinity.
pub fn voltage_ratio(measured_volts: f32, nominal_volts: f32, floor_volts: f32) -> f32 {
    nominal_volts / measured_volts.max(floor_volts)
}

/// Uniform driver-enhancement scaling applied to the final command,
/// whichever mode produced it.
pub fn scale_command(
    cmd: DriveCommand,
    slow_depth: f32,
    slow_factor: f32,
    volt_ratio: f32,
) -> DriveCommand {
    cmd.scaled((1.0 - slow_factor * slow_depth) * volt_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible_tag(forward_m: f32, lateral_m: f32, yaw_rad: f32) -> TagObservation {
        TagObservation {
            visible: true,
            forward_m,
            lateral_m,
            yaw_rad,
        }
    }

    #[test]
    fn test_invisible_tag_always_falls_back_to_manual() {
        let manual = DriveCommand::new(0.4, -0.2, 0.1);
        let obs = TagObservation::default();
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();

        // Engagement and lock inputs held as hard as possible: still manual.
        let input = BlendInput {
            manual,
            engage: 1.0,
            lock_held: true,
            cancel: false,
        };
        let out = blend(&input, &obs, &mut tracker, &config);
        assert_eq!(out.mode, AssistMode::Manual);
        assert_eq!(out.command, manual);
        assert!(!out.lock_pulse);
    }

    #[test]
    fn test_cancel_forces_manual_and_drops_lock() {
        let obs = visible_tag(1.2, 0.0, 0.0);
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();

        let mut input = BlendInput {
            manual: DriveCommand::zero(),
            engage: 0.0,
            lock_held: true,
            cancel: false,
        };
        let out = blend(&input, &obs, &mut tracker, &config);
        assert!(out.lock_pulse, "aligned on entry should pulse");

        input.cancel = true;
        let out = blend(&input, &obs, &mut tracker, &config);
        assert_eq!(out.mode, AssistMode::Manual);
        assert!(!tracker.locked());
    }

    #[test]
    fn test_align_corrects_rotation_only_plus_strafe() {
        let obs = visible_tag(2.0, 0.3, 0.2);
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();

        let input = BlendInput {
            manual: DriveCommand::new(0.5, 0.9, 0.9),
            engage: 0.0,
            lock_held: true,
            cancel: false,
        };
        let out = blend(&input, &obs, &mut tracker, &config);
        assert_eq!(out.mode, AssistMode::Align);
        // Forward stays fully manual.
        assert_eq!(out.command.forward, 0.5);
        // Rotation and strafe fight the error, not the sticks.
        assert!((out.command.rotate - (-0.2 * 1.2)).abs() < 1e-6);
        assert!((out.command.strafe - (-0.3 * 0.3)).abs() < 1e-6);
        assert!(!out.lock_pulse);
    }

    #[test]
    fn test_align_lock_boundary_is_inclusive() {
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();
        // Yaw error sits exactly on the tolerance: treated as locked.
        let obs = visible_tag(2.0, 0.0, config.align.yaw_tolerance_rad);

        let input = BlendInput {
            manual: DriveCommand::zero(),
            engage: 0.0,
            lock_held: true,
            cancel: false,
        };
        let out = blend(&input, &obs, &mut tracker, &config);
        assert_eq!(out.command.rotate, 0.0);
        assert!(out.lock_pulse);
        assert!(tracker.locked());
    }

    #[test]
    fn test_approach_corrections_and_nudge() {
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();
        // 0.5 m too far out, 0.2 m right of goal, square to the tag.
        let obs = visible_tag(1.7, 0.2, 0.0);

        let input = BlendInput {
            manual: DriveCommand::new(0.5, 0.0, 0.0),
            engage: 0.2,
            lock_held: false,
            cancel: false,
        };
        let out = blend(&input, &obs, &mut tracker, &config);
        assert_eq!(out.mode, AssistMode::Approach);

        let limit = 0.5 * (1.0 - 0.2);
        // kP correction saturates at the depth-scaled limit, nudge on top.
        assert!((out.command.forward - (-limit + 0.5 * 0.2)).abs() < 1e-6);
        assert!((out.command.strafe - (-0.2 * 1.0)).abs() < 1e-6);
        assert_eq!(out.command.rotate, 0.0);
    }

    #[test]
    fn test_approach_full_stop_inside_tolerances() {
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();
        // Every axis error on or inside its tolerance.
        let obs = visible_tag(1.2 + 0.05, 0.02, -0.03);

        let input = BlendInput {
            manual: DriveCommand::new(1.0, 1.0, 1.0),
            engage: 0.5,
            lock_held: false,
            cancel: false,
        };
        let out = blend(&input, &obs, &mut tracker, &config);
        // Exactly zero, nudge included: no hunting at the goal.
        assert_eq!(out.command, DriveCommand::zero());
    }

    #[test]
    fn test_deeper_engagement_tightens_speed_limit() {
        let config = AssistConfig::default();
        let mut tracker = TargetTracker::new();
        let obs = visible_tag(3.0, 0.0, 0.0);

        let shallow = BlendInput {
            manual: DriveCommand::zero(),
            engage: 0.1,
            lock_held: false,
            cancel: false,
        };
        let deep = BlendInput {
            engage: 0.9,
            ..shallow
        };
        let fast = blend(&shallow, &obs, &mut tracker, &config).command;
        let slow = blend(&deep, &obs, &mut tracker, &config).command;
        assert!(slow.forward.abs() < fast.forward.abs());
    }

    #[test]
    fn test_voltage_ratio_nominal_and_clamped() {
        assert_eq!(voltage_ratio(12.0, 12.0, 6.0), 1.0);
        // Sagging pack boosts the command.
        assert!(voltage_ratio(10.0, 12.0, 6.0) > 1.0);
        // Dead sensor: clamped at nominal/floor instead of diverging.
        assert_eq!(voltage_ratio(0.0, 12.0, 6.0), 2.0);
    }

    #[test]
    fn test_scale_command_slow_mode() {
        let cmd = DriveCommand::new(1.0, -0.5, 0.25);
        let scaled = scale_command(cmd, 1.0, 0.7, 1.0);
        // Full slow trigger leaves 30% authority.
        assert!((scaled.forward - 0.3).abs() < 1e-6);
        assert!((scaled.strafe + 0.15).abs() < 1e-6);
        assert!((scaled.rotate - 0.075).abs() < 1e-6);
    }
}
