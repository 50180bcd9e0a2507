// Differential-drive odometry
// Integrates cumulative wheel encoder counts into a planar pose (x, y, theta).

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geometry::normalize_angle;

/// Planar pose, theta in radians normalized to (-PI, PI]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }
}

/// Cumulative encoder counts as reported by the wheels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderTicks {
    pub left: i64,
    pub right: i64,
}

impl EncoderTicks {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }
}

/// Per-wheel values (distance, velocity) in calibrated units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelPair {
    pub left: f64,
    pub right: f64,
}

impl WheelPair {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }
}

/// Odometry estimator
///
/// Holds the primary pose, an independently managed "fix" pose, and the
/// wheel kinematic state derived from encoder counts.
#[derive(Debug, Clone)]
pub struct Odometry {
    pose: Pose,
    fix: Pose,

    ticks_per_unit: f64,
    width: f64,

    last_dist: Option<WheelPair>,
    delta: WheelPair,
    dist_sum: WheelPair,

    wheel_velocity: WheelPair,
    velocity: f64,
    turn_rate: f64,
}

impl Odometry {
    pub fn new(ticks_per_unit: f64, width: f64) -> Self {
        Self {
            pose: Pose::default(),
            fix: Pose::default(),
            ticks_per_unit,
            width,
            last_dist: None,
            delta: WheelPair::default(),
            dist_sum: WheelPair::default(),
            wheel_velocity: WheelPair::default(),
            velocity: 0.0,
            turn_rate: 0.0,
        }
    }

    /// Integrate a new encoder sample taken `dt` seconds after the previous one
    ///
    /// The first sample after construction or [`Odometry::reset`] only primes
    /// the stored wheel distances. A non-positive `dt` is ignored entirely.
    pub fn update(&mut self, ticks: EncoderTicks, dt: f64) {
        if dt <= 0.0 || self.ticks_per_unit == 0.0 {
            return;
        }

        let dist = WheelPair::new(
            ticks.left as f64 / self.ticks_per_unit,
            ticks.right as f64 / self.ticks_per_unit,
        );
        let Some(last) = self.last_dist.replace(dist) else {
            debug!("Odometry primed at {:?}", ticks);
            return;
        };

        let d_left = dist.left - last.left;
        let d_right = dist.right - last.right;
        self.delta = WheelPair::new(d_left, d_right);
        self.dist_sum.left += d_left;
        self.dist_sum.right += d_right;

        self.wheel_velocity = WheelPair::new(d_left / dt, d_right / dt);
        self.velocity = (self.wheel_velocity.left + self.wheel_velocity.right) / 2.0;

        let d_theta = if self.width == 0.0 {
            0.0
        } else {
            (d_right - d_left) / self.width
        };
        self.turn_rate = d_theta / dt;

        // Midpoint heading integration
        let d_center = (d_left + d_right) / 2.0;
        let mid_theta = self.pose.theta + d_theta / 2.0;
        self.pose.x += d_center * mid_theta.cos();
        self.pose.y += d_center * mid_theta.sin();
        self.pose.theta = normalize_angle(mid_theta + d_theta / 2.0);
    }

    /// Zero pose, fix pose and wheel state; the next sample re-primes
    pub fn reset(&mut self) {
        *self = Self::new(self.ticks_per_unit, self.width);
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = Pose::new(pose.x, pose.y, pose.theta);
    }

    pub fn set_x(&mut self, x: f64) {
        self.pose.x = x;
    }

    pub fn set_y(&mut self, y: f64) {
        self.pose.y = y;
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.pose.theta = normalize_angle(theta);
    }

    pub fn fix(&self) -> Pose {
        self.fix
    }

    pub fn set_fix_x(&mut self, x: f64) {
        self.fix.x = x;
    }

    pub fn set_fix_y(&mut self, y: f64) {
        self.fix.y = y;
    }

    pub fn set_fix_theta(&mut self, theta: f64) {
        self.fix.theta = normalize_angle(theta);
    }

    pub fn ticks_per_unit(&self) -> f64 {
        self.ticks_per_unit
    }

    /// Changing the scale discards the stored distances so no jump is integrated
    pub fn set_ticks_per_unit(&mut self, ticks_per_unit: f64) {
        self.ticks_per_unit = ticks_per_unit;
        self.last_dist = None;
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    /// Distance each wheel moved during the last integrated sample
    pub fn delta(&self) -> WheelPair {
        self.delta
    }

    /// Distance each wheel moved since reset
    pub fn distance_sums(&self) -> WheelPair {
        self.dist_sum
    }

    pub fn wheel_velocities(&self) -> WheelPair {
        self.wheel_velocity
    }

    /// Robot linear velocity, mean of the two wheels
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Measured heading rate in rad/s
    pub fn turn_rate(&self) -> f64 {
        self.turn_rate
    }
}
