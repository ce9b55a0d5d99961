// Fiducial target tracking
//
// Turns the per-cycle tag observation into alignment errors against the
// configured goal pose and keeps the one piece of history the assist logic
// needs: whether the target was locked on the previous cycle.

use crate::messages::TagObservation;

/// Where the robot wants to sit relative to the tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGoal {
    /// Desired forward range to the tag, meters.
    pub forward_m: f32,
    /// Desired lateral offset, meters. Positive shifts the robot left of
    /// the tag center.
    pub lateral_m: f32,
}

impl Default for TargetGoal {
    fn default() -> Self {
        Self {
            forward_m: 1.2,
            lateral_m: 0.0,
        }
    }
}

/// Signed alignment errors for one cycle. Only meaningful when the
/// observation that produced them was visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentErrors {
    pub forward_m: f32,
    pub lateral_m: f32,
    pub yaw_rad: f32,
}

impl AlignmentErrors {
    pub fn from_observation(obs: &TagObservation, goal: &TargetGoal) -> Self {
        Self {
            forward_m: obs.forward_m - goal.forward_m,
            lateral_m: obs.lateral_m - goal.lateral_m,
            yaw_rad: obs.yaw_rad,
        }
    }
}

/// Edge-triggered lock latch.
///
/// The boundary is inclusive: an error sitting exactly on the tolerance
/// counts as aligned. Leaving the band clears the latch so the next
/// re-entry pulses again.
#[derive(Debug, Default)]
pub struct TargetTracker {
    locked: bool,
}

impl TargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Feed this cycle's aligned/not-aligned verdict. Returns true only on
    /// the cycle the lock is first acquired.
    pub fn update(&mut self, aligned: bool) -> bool {
        let pulse = aligned && !self.locked;
        self.locked = aligned;
        pulse
    }

    /// Drop the lock without pulsing (mode left, tag lost, assist canceled).
    pub fn clear(&mut self) {
        self.locked = false;
    }
}
