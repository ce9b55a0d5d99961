// Flywheel/feeder launch sequencing
//
// One state machine covers both flywheel control modes: closed-loop velocity
// (encoder feedback, tolerance-gated) and open-loop power (minimum measured
// RPM floor). The mode is a config-time choice, not a separate code path.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Encoder resolution of the flywheel motor.
const TICKS_PER_REV: f32 = 28.0;

pub fn rpm_to_ticks_per_s(rpm: f32) -> f32 {
    (rpm / 60.0) * TICKS_PER_REV
}

pub fn ticks_per_s_to_rpm(ticks_per_s: f32) -> f32 {
    (ticks_per_s / TICKS_PER_REV) * 60.0
}

/// How the flywheel is commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlywheelMode {
    /// Closed-loop velocity targets in RPM. Readiness means the measured
    /// velocity sits within `tolerance_rpm` of the commanded target.
    Velocity {
        low_rpm: f32,
        high_rpm: f32,
        tolerance_rpm: f32,
        min_ready_rpm: f32,
    },
    /// Open-loop power levels. Readiness means the measured velocity has
    /// climbed past `min_ready_rpm`.
    Power {
        low: f32,
        high: f32,
        min_ready_rpm: f32,
    },
}

impl Default for FlywheelMode {
    fn default() -> Self {
        Self::Velocity {
            low_rpm: 2500.0,
            high_rpm: 3500.0,
            tolerance_rpm: 100.0,
            min_ready_rpm: 2450.0,
        }
    }
}

/// Launcher tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LauncherConfig {
    pub mode: FlywheelMode,
    /// How long the feeder runs per shot.
    pub feed_time: Duration,
    pub feed_power: f32,
    /// Trigger depth above which the high speed tier is selected.
    pub trigger_high: f32,
    /// Trigger depth above which the low speed tier is selected.
    pub trigger_low: f32,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            mode: FlywheelMode::default(),
            feed_time: Duration::from_millis(200),
            feed_power: 1.0,
            trigger_high: 0.8,
            trigger_low: 0.3,
        }
    }
}

/// Command sent to the flywheel actuator each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum FlywheelCommand {
    /// Closed-loop velocity target in encoder ticks per second.
    Velocity(f32),
    /// Open-loop power in [-1, 1].
    Power(f32),
}

impl FlywheelCommand {
    pub fn is_off(&self) -> bool {
        match *self {
            FlywheelCommand::Velocity(v) => v == 0.0,
            FlywheelCommand::Power(p) => p == 0.0,
        }
    }
}

/// Launch sequence state. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    Idle,
    SpinUp,
    ReadyWait,
    Feeding,
}

impl LaunchState {
    pub fn name(&self) -> &'static str {
        match self {
            LaunchState::Idle => "IDLE",
            LaunchState::SpinUp => "SPIN_UP",
            LaunchState::ReadyWait => "READY_WAIT",
            LaunchState::Feeding => "FEEDING",
        }
    }
}

/// Per-cycle driver inputs the launcher cares about.
#[derive(Debug, Clone, Copy, Default)]
pub struct LauncherInput {
    /// Analog trigger selecting the speed tier.
    pub speed_trigger: f32,
    /// Fire request (held button).
    pub fire: bool,
}

/// Actuator commands and feedback produced by one launcher update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LauncherOutput {
    pub flywheel: FlywheelCommand,
    pub feeder_power: f32,
    /// True on the cycle the flywheel first reaches speed (one-shot).
    pub rumble: bool,
}

pub struct Launcher {
    config: LauncherConfig,
    state: LaunchState,
    feed_started: Option<Instant>,
    at_speed_prev: bool,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            state: LaunchState::Idle,
            feed_started: None,
            at_speed_prev: false,
        }
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// Whether the flywheel was at speed on the most recent update.
    pub fn at_speed(&self) -> bool {
        self.at_speed_prev
    }

    /// Advance the launcher by one control cycle.
    ///
    /// `measured_ticks_per_s` is the flywheel encoder velocity read this
    /// cycle, `volt_ratio` the battery compensation ratio applied to
    /// closed-loop targets. Transitions cascade, so feedback that already
    /// satisfies the gates reaches `Feeding` within a single update.
    pub fn update(
        &mut self,
        input: LauncherInput,
        measured_ticks_per_s: f32,
        volt_ratio: f32,
        now: Instant,
    ) -> LauncherOutput {
        let flywheel = self.flywheel_command(input.speed_trigger, volt_ratio);
        let measured_rpm = ticks_per_s_to_rpm(measured_ticks_per_s);

        // Readiness is computed every cycle, independent of the state
        // machine, so telemetry and the rumble pulse track flywheel health
        // even while idle.
        let at_speed = match (self.config.mode, flywheel) {
            (FlywheelMode::Velocity { tolerance_rpm, .. }, FlywheelCommand::Velocity(target)) => {
                target > 0.0
                    && (measured_ticks_per_s - target).abs() <= rpm_to_ticks_per_s(tolerance_rpm)
            }
            (FlywheelMode::Power { min_ready_rpm, .. }, FlywheelCommand::Power(p)) => {
                p != 0.0 && measured_rpm >= min_ready_rpm
            }
            _ => false,
        };
        let rumble = at_speed && !self.at_speed_prev;
        self.at_speed_prev = at_speed;

        let min_ready_rpm = match self.config.mode {
            FlywheelMode::Velocity { min_ready_rpm, .. } => min_ready_rpm,
            FlywheelMode::Power { min_ready_rpm, .. } => min_ready_rpm,
        };
        let armed = input.fire && !flywheel.is_off();

        // At most one transition per iteration; a completed feed ends the
        // cascade so the feeder always reports zero for at least one cycle
        // between shots.
        loop {
            let next = match self.state {
                LaunchState::Idle => {
                    if armed {
                        LaunchState::SpinUp
                    } else {
                        break;
                    }
                }
                LaunchState::SpinUp => {
                    if !armed {
                        LaunchState::Idle
                    } else if measured_rpm >= min_ready_rpm {
                        LaunchState::ReadyWait
                    } else {
                        break;
                    }
                }
                LaunchState::ReadyWait => {
                    if !armed {
                        LaunchState::Idle
                    } else if at_speed {
                        self.feed_started = Some(now);
                        LaunchState::Feeding
                    } else {
                        break;
                    }
                }
                LaunchState::Feeding => {
                    // The feed duration is a hard commitment: driver input
                    // cannot retract a half-fed projectile.
                    let elapsed = self
                        .feed_started
                        .map(|t| now.duration_since(t))
                        .unwrap_or(Duration::ZERO);
                    if elapsed > self.config.feed_time {
                        self.feed_started = None;
                        self.state = LaunchState::Idle;
                    }
                    break;
                }
            };
            self.state = next;
        }

        LauncherOutput {
            flywheel,
            feeder_power: if self.state == LaunchState::Feeding {
                self.config.feed_power
            } else {
                0.0
            },
            rumble,
        }
    }

    /// Map the speed trigger to a flywheel command, tiered exactly like the
    /// drive team expects: deep pull = high, partial pull = low, released =
    /// off. Closed-loop targets are battery-compensated so launch energy
    /// stays constant as the pack sags.
    fn flywheel_command(&self, trigger: f32, volt_ratio: f32) -> FlywheelCommand {
        match self.config.mode {
            FlywheelMode::Velocity {
                low_rpm, high_rpm, ..
            } => {
                let rpm = if trigger > self.config.trigger_high {
                    high_rpm
                } else if trigger > self.config.trigger_low {
                    low_rpm
                } else {
                    0.0
                };
                if rpm == 0.0 {
                    FlywheelCommand::Velocity(0.0)
                } else {
                    FlywheelCommand::Velocity(rpm_to_ticks_per_s(rpm) * volt_ratio)
                }
            }
            FlywheelMode::Power { low, high, .. } => {
                let power = if trigger > self.config.trigger_high {
                    high
                } else if trigger > self.config.trigger_low {
                    low
                } else {
                    0.0
                };
                FlywheelCommand::Power(power)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn velocity_launcher() -> Launcher {
        Launcher::new(LauncherConfig::default())
    }

    fn high_target_ticks() -> f32 {
        rpm_to_ticks_per_s(3500.0)
    }

    fn fire_at_speed() -> LauncherInput {
        LauncherInput {
            speed_trigger: 1.0,
            fire: true,
        }
    }

    #[test]
    fn test_idle_stays_idle_without_fire() {
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();
        for i in 0u64..20 {
            let out = launcher.update(
                LauncherInput::default(),
                0.0,
                1.0,
                t0 + Duration::from_millis(i * 20),
            );
            assert_eq!(launcher.state(), LaunchState::Idle);
            assert_eq!(out.feeder_power, 0.0);
            assert!(out.flywheel.is_off());
        }
    }

    #[test]
    fn test_immediate_feed_single_step() {
        // Feedback already satisfies the gates: one update reaches FEEDING.
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();

        let out = launcher.update(fire_at_speed(), high_target_ticks(), 1.0, t0);
        assert_eq!(launcher.state(), LaunchState::Feeding);
        assert_eq!(out.feeder_power, 1.0);

        // Feeder still running mid-feed (0.2s feed time).
        let out = launcher.update(
            fire_at_speed(),
            high_target_ticks(),
            1.0,
            t0 + Duration::from_millis(100),
        );
        assert_eq!(out.feeder_power, 1.0);

        // Past the feed window: feeder off, back to IDLE.
        let out = launcher.update(
            fire_at_speed(),
            high_target_ticks(),
            1.0,
            t0 + Duration::from_millis(250),
        );
        assert_eq!(out.feeder_power, 0.0);
        assert_eq!(launcher.state(), LaunchState::Idle);
    }

    #[test]
    fn test_release_aborts_spin_up() {
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();

        // Spinning but nowhere near speed: stuck in SPIN_UP.
        launcher.update(fire_at_speed(), rpm_to_ticks_per_s(500.0), 1.0, t0);
        assert_eq!(launcher.state(), LaunchState::SpinUp);

        // Fire released before threshold: back to IDLE.
        let input = LauncherInput {
            speed_trigger: 1.0,
            fire: false,
        };
        launcher.update(input, rpm_to_ticks_per_s(500.0), 1.0, t0 + Duration::from_millis(20));
        assert_eq!(launcher.state(), LaunchState::Idle);
    }

    #[test]
    fn test_ready_wait_holds_until_tolerance() {
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();

        // Past the min-ready floor but outside the tolerance band.
        launcher.update(fire_at_speed(), rpm_to_ticks_per_s(3200.0), 1.0, t0);
        assert_eq!(launcher.state(), LaunchState::ReadyWait);

        // Inside tolerance: feed starts.
        let out = launcher.update(
            fire_at_speed(),
            rpm_to_ticks_per_s(3450.0),
            1.0,
            t0 + Duration::from_millis(20),
        );
        assert_eq!(launcher.state(), LaunchState::Feeding);
        assert_eq!(out.feeder_power, 1.0);
    }

    #[test]
    fn test_feeding_is_uninterruptible() {
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();
        launcher.update(fire_at_speed(), high_target_ticks(), 1.0, t0);
        assert_eq!(launcher.state(), LaunchState::Feeding);

        // Everything released mid-feed: the feed still completes.
        let out = launcher.update(
            LauncherInput::default(),
            0.0,
            1.0,
            t0 + Duration::from_millis(100),
        );
        assert_eq!(launcher.state(), LaunchState::Feeding);
        assert_eq!(out.feeder_power, 1.0);
    }

    #[test]
    fn test_at_speed_rumble_is_edge_triggered() {
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();
        let input = LauncherInput {
            speed_trigger: 1.0,
            fire: false,
        };

        let out = launcher.update(input, high_target_ticks(), 1.0, t0);
        assert!(out.rumble, "first cycle at speed should pulse");

        let out = launcher.update(input, high_target_ticks(), 1.0, t0 + Duration::from_millis(20));
        assert!(!out.rumble, "held at speed must not re-pulse");

        // Drop out of band, then return: pulse re-arms.
        let out = launcher.update(input, 0.0, 1.0, t0 + Duration::from_millis(40));
        assert!(!out.rumble);
        let out = launcher.update(input, high_target_ticks(), 1.0, t0 + Duration::from_millis(60));
        assert!(out.rumble);
    }

    #[test]
    fn test_velocity_targets_are_voltage_compensated() {
        let mut launcher = velocity_launcher();
        let t0 = Instant::now();
        let input = LauncherInput {
            speed_trigger: 0.5,
            fire: false,
        };

        let out = launcher.update(input, 0.0, 1.2, t0);
        match out.flywheel {
            FlywheelCommand::Velocity(v) => {
                assert!((v - rpm_to_ticks_per_s(2500.0) * 1.2).abs() < 1e-3)
            }
            other => panic!("expected velocity command, got {:?}", other),
        }

        // Released trigger commands exactly zero, never a compensated zero.
        let out = launcher.update(LauncherInput::default(), 0.0, 1.2, t0);
        assert_eq!(out.flywheel, FlywheelCommand::Velocity(0.0));
    }

    #[test]
    fn test_power_mode_floor_gates_feed() {
        let config = LauncherConfig {
            mode: FlywheelMode::Power {
                low: 0.67,
                high: 1.0,
                min_ready_rpm: 2450.0,
            },
            ..LauncherConfig::default()
        };
        let mut launcher = Launcher::new(config);
        let t0 = Instant::now();

        // Below the floor: holds in SPIN_UP at full power.
        let out = launcher.update(fire_at_speed(), rpm_to_ticks_per_s(1000.0), 1.0, t0);
        assert_eq!(out.flywheel, FlywheelCommand::Power(1.0));
        assert_eq!(launcher.state(), LaunchState::SpinUp);

        // Past the floor: power mode has no tolerance band, so the cascade
        // runs straight through READY_WAIT into FEEDING.
        let out = launcher.update(
            fire_at_speed(),
            rpm_to_ticks_per_s(2600.0),
            1.0,
            t0 + Duration::from_millis(20),
        );
        assert_eq!(launcher.state(), LaunchState::Feeding);
        assert_eq!(out.feeder_power, 1.0);
    }
}
