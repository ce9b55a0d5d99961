// Per-tick control orchestration
//
// Owns every piece of cycle-to-cycle state (launcher, lock latch) and turns
// one immutable input snapshot into actuator commands plus the status
// report. No hardware, no transport: the runtime feeds it and ships what
// comes out, which is also what makes the whole control core unit-testable.

use std::time::Instant;

use crate::control::blender::{
    blend, scale_command, voltage_ratio, AssistConfig, AssistMode, BlendInput, BlendOutput,
};
use crate::control::kinematics::{solve, DriveCommand, WheelGeometry, WheelPowers};
use crate::control::launcher::{
    ticks_per_s_to_rpm, Launcher, LauncherConfig, LauncherInput, LauncherOutput,
};
use crate::control::vision::TargetTracker;
use crate::messages::{GamepadState, StatusReport, TagObservation};

/// Rumble lengths, matching what the drive team is used to feeling.
const RUMBLE_AT_SPEED_MS: u64 = 200;
const RUMBLE_LOCKED_MS: u64 = 250;

/// Every tunable the control core needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlConfig {
    pub geometry: WheelGeometry,
    /// Fraction of authority removed at full slow-mode trigger.
    pub slow_factor: f32,
    pub launcher: LauncherConfig,
    pub assist: AssistConfig,
    pub nominal_voltage: f32,
    /// Floor for the compensation denominator.
    pub min_voltage: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            geometry: WheelGeometry::default(),
            slow_factor: 0.7,
            launcher: LauncherConfig::default(),
            assist: AssistConfig::default(),
            nominal_voltage: 12.0,
            min_voltage: 6.0,
        }
    }
}

/// One cycle's worth of input, read once and immutable for the rest of the
/// cycle so the state machine and the telemetry describing it never tear.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub gamepad: GamepadState,
    pub tag: TagObservation,
    pub flywheel_ticks_per_s: f32,
    pub battery_volts: f32,
}

/// Everything one cycle produces.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub drive: WheelPowers,
    pub launcher: LauncherOutput,
    pub mode: AssistMode,
    /// One-shot haptic request, already arbitrated between sources.
    pub rumble_ms: Option<u64>,
    pub status: StatusReport,
}

pub struct ControlCore {
    config: ControlConfig,
    launcher: Launcher,
    tracker: TargetTracker,
}

impl ControlCore {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            launcher: Launcher::new(config.launcher),
            tracker: TargetTracker::new(),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Run one control cycle.
    pub fn cycle(&mut self, snapshot: &InputSnapshot, now: Instant) -> CycleOutput {
        let gp = &snapshot.gamepad;
        let volt_ratio = voltage_ratio(
            snapshot.battery_volts,
            self.config.nominal_voltage,
            self.config.min_voltage,
        );

        let launcher = self.launcher.update(
            LauncherInput {
                speed_trigger: gp.right_trigger,
                fire: gp.x,
            },
            snapshot.flywheel_ticks_per_s,
            volt_ratio,
            now,
        );

        // Stick forward is pad-negative-up.
        let manual = DriveCommand::new(-gp.left_stick_y, gp.left_stick_x, gp.right_stick_x);
        let BlendOutput {
            command,
            mode,
            lock_pulse,
        } = blend(
            &BlendInput {
                manual,
                engage: gp.left_trigger,
                lock_held: gp.y,
                cancel: gp.b,
            },
            &snapshot.tag,
            &mut self.tracker,
            &self.config.assist,
        );

        let scaled = scale_command(command, gp.left_trigger, self.config.slow_factor, volt_ratio);
        let drive = solve(scaled, &self.config.geometry);

        // Lock acquisition outranks the at-speed pulse when both land on
        // the same cycle.
        let rumble_ms = if lock_pulse {
            Some(RUMBLE_LOCKED_MS)
        } else if launcher.rumble {
            Some(RUMBLE_AT_SPEED_MS)
        } else {
            None
        };

        let status = StatusReport {
            mode: if mode == AssistMode::Align && self.tracker.locked() {
                "TARGET_LOCKED".to_string()
            } else {
                mode.name().to_string()
            },
            launch_state: self.launcher.state().name().to_string(),
            tag_visible: snapshot.tag.visible,
            tag: snapshot.tag.visible.then_some(snapshot.tag),
            flywheel: launcher.flywheel,
            measured_rpm: ticks_per_s_to_rpm(snapshot.flywheel_ticks_per_s),
            flywheel_ready: self.launcher.at_speed(),
            battery_volts: snapshot.battery_volts,
            wheel_powers: drive.as_array(),
            pose: None,
        };

        CycleOutput {
            drive,
            launcher,
            mode,
            rumble_ms,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::launcher::{rpm_to_ticks_per_s, LaunchState};

    fn core() -> ControlCore {
        ControlCore::new(ControlConfig::default())
    }

    fn nominal_snapshot() -> InputSnapshot {
        InputSnapshot {
            battery_volts: 12.0,
            ..InputSnapshot::default()
        }
    }

    #[test]
    fn test_neutral_snapshot_is_all_stop() {
        let mut core = core();
        let out = core.cycle(&nominal_snapshot(), Instant::now());
        assert_eq!(out.drive, WheelPowers::zero());
        assert_eq!(out.launcher.feeder_power, 0.0);
        assert!(out.launcher.flywheel.is_off());
        assert_eq!(out.mode, AssistMode::Manual);
        assert!(out.rumble_ms.is_none());
    }

    #[test]
    fn test_manual_sticks_reach_wheels() {
        let mut core = core();
        let mut snapshot = nominal_snapshot();
        snapshot.gamepad.left_stick_y = -0.6; // forward

        let out = core.cycle(&snapshot, Instant::now());
        for p in out.drive.as_array() {
            assert!((p - 0.6).abs() < 1e-5);
        }
    }

    #[test]
    fn test_voltage_comp_boosts_sagging_pack() {
        let mut core = core();
        let mut snapshot = nominal_snapshot();
        snapshot.gamepad.left_stick_y = -0.5;
        snapshot.battery_volts = 10.0;

        let out = core.cycle(&snapshot, Instant::now());
        // 0.5 * 12/10 = 0.6 on every wheel.
        for p in out.drive.as_array() {
            assert!((p - 0.6).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fire_sequence_through_core() {
        let mut core = core();
        let mut snapshot = nominal_snapshot();
        snapshot.gamepad.right_trigger = 1.0;
        snapshot.gamepad.x = true;
        snapshot.flywheel_ticks_per_s = rpm_to_ticks_per_s(3500.0);
        let t0 = Instant::now();

        let out = core.cycle(&snapshot, t0);
        assert_eq!(out.launcher.feeder_power, 1.0);
        assert_eq!(out.status.launch_state, "FEEDING");
        // At-speed edge fires the haptic pulse on the same cycle.
        assert_eq!(out.rumble_ms, Some(RUMBLE_AT_SPEED_MS));

        let out = core.cycle(&snapshot, t0 + std::time::Duration::from_millis(250));
        assert_eq!(out.launcher.feeder_power, 0.0);
        assert_eq!(core.launcher.state(), LaunchState::Idle);
    }

    #[test]
    fn test_lock_pulse_wins_rumble_arbitration() {
        let mut core = core();
        let mut snapshot = nominal_snapshot();
        // Tag dead ahead and aligned; flywheel reaching speed on the same
        // cycle.
        snapshot.tag = TagObservation {
            visible: true,
            forward_m: 2.0,
            lateral_m: 0.0,
            yaw_rad: 0.0,
        };
        snapshot.gamepad.y = true;
        snapshot.gamepad.right_trigger = 1.0;
        snapshot.flywheel_ticks_per_s = rpm_to_ticks_per_s(3500.0);

        let out = core.cycle(&snapshot, Instant::now());
        assert_eq!(out.mode, AssistMode::Align);
        assert_eq!(out.rumble_ms, Some(RUMBLE_LOCKED_MS));
    }

    #[test]
    fn test_drive_and_launcher_are_independent() {
        let mut core = core();
        let mut snapshot = nominal_snapshot();
        snapshot.gamepad.left_stick_y = -1.0;
        snapshot.gamepad.right_trigger = 0.5;
        let t0 = Instant::now();

        let out = core.cycle(&snapshot, t0);
        // Driving flat out does not disturb the launcher, and vice versa.
        assert!(out.drive.front_left > 0.9);
        assert_eq!(core.launcher.state(), LaunchState::Idle);
        assert!(!out.launcher.flywheel.is_off());
    }

    #[test]
    fn test_status_reports_mode_names() {
        let mut core = core();
        let mut snapshot = nominal_snapshot();
        snapshot.tag = TagObservation {
            visible: true,
            forward_m: 3.0,
            lateral_m: 0.4,
            yaw_rad: 0.3,
        };
        snapshot.gamepad.left_trigger = 0.3;

        let out = core.cycle(&snapshot, Instant::now());
        assert_eq!(out.mode, AssistMode::Approach);
        assert_eq!(out.status.mode, "APPROACH");
        assert!(out.status.tag.is_some());
    }
}
