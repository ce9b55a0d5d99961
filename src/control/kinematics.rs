// Mecanum inverse kinematics for the four-wheel base
// Converts a body-frame drive command (forward, strafe, rotate) to per-wheel powers.

/// Planar offset of one wheel from the chassis center, in meters.
///
/// `x` is positive toward the front, `y` positive toward the left side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelOffset {
    pub x: f32,
    pub y: f32,
}

impl WheelOffset {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Mounting positions of the four wheels.
///
/// Asymmetric layouts are supported on purpose: the competition chassis has
/// its front-right wheel shifted toward the centerline, and the rotation
/// term below compensates for that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelGeometry {
    pub front_left: WheelOffset,
    pub front_right: WheelOffset,
    pub back_left: WheelOffset,
    pub back_right: WheelOffset,
}

impl WheelGeometry {
    /// Square layout with every wheel `half` meters from both axes.
    pub const fn symmetric(half: f32) -> Self {
        Self {
            front_left: WheelOffset::new(half, half),
            front_right: WheelOffset::new(half, -half),
            back_left: WheelOffset::new(-half, half),
            back_right: WheelOffset::new(-half, -half),
        }
    }
}

impl Default for WheelGeometry {
    /// Measured offsets of the actual chassis (front-right pulled in toward
    /// the centerline).
    fn default() -> Self {
        Self {
            front_left: WheelOffset::new(0.15, 0.15),
            front_right: WheelOffset::new(0.15, -0.075),
            back_left: WheelOffset::new(-0.15, 0.15),
            back_right: WheelOffset::new(-0.15, -0.15),
        }
    }
}

/// Body-frame velocity intent before normalization.
///
/// Components are stick-scale values, nominally in [-1, 1] but not clamped:
/// assist corrections and nudges may push them outside, and the solver's
/// normalization brings the result back into range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub forward: f32,
    pub strafe: f32,
    pub rotate: f32,
}

impl DriveCommand {
    pub const fn new(forward: f32, strafe: f32, rotate: f32) -> Self {
        Self {
            forward,
            strafe,
            rotate,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            self.forward * factor,
            self.strafe * factor,
            self.rotate * factor,
        )
    }
}

/// Normalized power for each drive motor, each in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelPowers {
    pub front_left: f32,
    pub front_right: f32,
    pub back_left: f32,
    pub back_right: f32,
}

impl WheelPowers {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns powers as array [front_left, front_right, back_left, back_right]
    pub fn as_array(&self) -> [f32; 4] {
        [
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        ]
    }
}

/// Convert a body-frame drive command to normalized wheel powers.
///
/// Per-wheel raw power is `forward ± strafe + rotate * k`, where `k` is the
/// negated lateral offset of that wheel. Wheels farther from the centerline
/// get proportionally more rotational power, which is what keeps the turn
/// center honest on the asymmetric layout.
///
/// Normalization divides all four raw powers by `max(1.0, max(|raw|))`, so
/// outputs never exceed unit magnitude and wheel ratios are preserved when
/// any wheel would saturate. A zero command always yields zero powers.
pub fn solve(cmd: DriveCommand, geometry: &WheelGeometry) -> WheelPowers {
    let DriveCommand {
        forward,
        strafe,
        rotate,
    } = cmd;

    let fl = forward + strafe + rotate * -geometry.front_left.y;
    let fr = forward - strafe + rotate * -geometry.front_right.y;
    let bl = forward - strafe + rotate * -geometry.back_left.y;
    let br = forward + strafe + rotate * -geometry.back_right.y;

    let scale = [fl, fr, bl, br]
        .iter()
        .map(|p| p.abs())
        .fold(1.0f32, f32::max);

    WheelPowers {
        front_left: fl / scale,
        front_right: fr / scale,
        back_left: bl / scale,
        back_right: br / scale,
    }
}
