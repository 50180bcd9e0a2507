// Wheel velocity controller
// Acceleration-limits the commanded body velocity/turn, splits it into per-wheel
// targets and closes one PID loop per wheel to produce motor outputs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::odometry::WheelPair;
use super::pid::Pid;
use super::range::Range;

/// Default limits, in calibrated units per second
pub const DEFAULT_MAX_VELOCITY: f64 = 1.0;
pub const DEFAULT_MAX_TURN: f64 = 2.0;
pub const DEFAULT_MAX_OUTPUT: i32 = 255;

/// Integer (max, dead, min) triple for motor outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRange {
    pub max: i32,
    pub dead: i32,
    pub min: i32,
}

impl OutputRange {
    pub const fn new(max: i32, dead: i32, min: i32) -> Self {
        Self { max, dead, min }
    }

    pub fn as_range(&self) -> Range {
        Range::new(self.max as f64, self.dead as f64, self.min as f64)
    }
}

pub struct WheelVelocityController {
    pid_left: Pid,
    pid_right: Pid,

    velocity_range: Range,
    turn_range: Range,
    output_range: OutputRange,

    accel: f64,
    turn_accel: Option<f64>,
    width: f64,

    velocity: f64,
    turn: f64,
    wheel_targets: WheelPair,

    left_out: i32,
    right_out: i32,
}

impl WheelVelocityController {
    pub fn new(width: f64) -> Self {
        let mut controller = Self {
            pid_left: Pid::new(0.0, 0.0, 0.0),
            pid_right: Pid::new(0.0, 0.0, 0.0),
            velocity_range: Range::symmetric(DEFAULT_MAX_VELOCITY),
            turn_range: Range::symmetric(DEFAULT_MAX_TURN),
            output_range: OutputRange::new(DEFAULT_MAX_OUTPUT, 0, 0),
            accel: f64::INFINITY,
            turn_accel: None,
            width,
            velocity: 0.0,
            turn: 0.0,
            wheel_targets: WheelPair::default(),
            left_out: 0,
            right_out: 0,
        };
        controller.set_output_range(controller.output_range);
        controller
    }

    /// Run one control step
    ///
    /// # Arguments
    /// * `target_velocity` - Desired robot linear velocity (units/s)
    /// * `target_turn` - Desired heading rate (rad/s, positive = counter-clockwise)
    /// * `measured` - Wheel velocities from odometry
    /// * `dt` - Seconds since the previous step
    pub fn update(&mut self, target_velocity: f64, target_turn: f64, measured: WheelPair, dt: f64) {
        let target_velocity = self.velocity_range.apply(target_velocity);
        let target_turn = self.turn_range.apply(target_turn);

        // inf * 0 would poison the state with NaN
        let max_step = |rate: f64| if dt > 0.0 { rate * dt } else { 0.0 };
        self.velocity = step_toward(self.velocity, target_velocity, max_step(self.accel));
        self.turn = step_toward(self.turn, target_turn, max_step(self.turn_accel()));

        let half_track = self.turn * self.width / 2.0;
        self.wheel_targets = WheelPair::new(self.velocity - half_track, self.velocity + half_track);

        let output_range = self.output_range.as_range();
        let left = self.pid_left.compute(self.wheel_targets.left, measured.left, dt);
        let right = self.pid_right.compute(self.wheel_targets.right, measured.right, dt);
        self.left_out = output_range.apply_output(left);
        self.right_out = output_range.apply_output(right);

        debug!(
            "Velocity step: vel={:.3} turn={:.3} targets=({:.3}, {:.3}) measured=({:.3}, {:.3}) out=({}, {})",
            self.velocity,
            self.turn,
            self.wheel_targets.left,
            self.wheel_targets.right,
            measured.left,
            measured.right,
            self.left_out,
            self.right_out
        );
    }


    pub fn set_pid(&mut self, p: f64, i: f64, d: f64) {
        self.pid_left.set_gains(p, i, d);
        self.pid_right.set_gains(p, i, d);
    }

    pub fn pid_gains(&self) -> (f64, f64, f64) {
        self.pid_left.gains()
    }

    pub fn reset_pid(&mut self) {
        self.pid_left.reset();
        self.pid_right.reset();
    }

    /// Accumulated integral term of each wheel PID
    pub fn pid_integrals(&self) -> WheelPair {
        WheelPair::new(self.pid_left.integral(), self.pid_right.integral())
    }

    pub fn accel(&self) -> f64 {
        self.accel
    }

    /// Linear acceleration limit in units/s^2; infinity disables limiting
    pub fn set_accel(&mut self, accel: f64) {
        self.accel = accel.abs();
    }

    /// Turn acceleration limit in rad/s^2, the linear limit unless overridden
    pub fn turn_accel(&self) -> f64 {
        self.turn_accel.unwrap_or(self.accel)
    }

    /// Override the turn limit; `None` follows `accel` again
    pub fn set_turn_accel(&mut self, turn_accel: Option<f64>) {
        self.turn_accel = turn_accel.map(f64::abs);
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    pub fn velocity_range(&self) -> Range {
        self.velocity_range
    }

    pub fn set_velocity_range(&mut self, range: Range) {
        self.velocity_range = range;
    }

    pub fn turn_range(&self) -> Range {
        self.turn_range
    }

    pub fn set_turn_range(&mut self, range: Range) {
        self.turn_range = range;
    }

    pub fn set_max_velocity(&mut self, max: f64) {
        self.velocity_range.max = max;
    }

    pub fn set_max_turn(&mut self, max: f64) {
        self.turn_range.max = max;
    }

    pub fn output_range(&self) -> OutputRange {
        self.output_range
    }

    /// PID outputs are limited to +/- max before the deadband mapping
    pub fn set_output_range(&mut self, range: OutputRange) {
        self.output_range = range;
        let max = range.max.abs() as f64;
        self.pid_left.set_output_limits(-max, max);
        self.pid_right.set_output_limits(-max, max);
    }

    /// Current (acceleration-limited) linear velocity
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Current (acceleration-limited) turn rate
    pub fn turn(&self) -> f64 {
        self.turn
    }

    pub fn wheel_targets(&self) -> WheelPair {
        self.wheel_targets
    }

    pub fn left_out(&self) -> i32 {
        self.left_out
    }

    pub fn right_out(&self) -> i32 {
        self.right_out
    }

    /// Zero commanded state and PID history, keeping calibration
    pub fn reset(&mut self) {
        self.velocity = 0.0;
        self.turn = 0.0;
        self.wheel_targets = WheelPair::default();
        self.left_out = 0;
        self.right_out = 0;
        self.reset_pid();
    }
}

/// Move `current` toward `target` by at most `max_step`
fn step_toward(current: f64, target: f64, max_step: f64) -> f64 {
    let gap = target - current;
    if gap.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_step_toward_snaps_without_overshoot() {
        assert_eq!(step_toward(0.0, 1.0, 0.3), 0.3);
        assert_eq!(step_toward(0.9, 1.0, 0.3), 1.0);
        assert_eq!(step_toward(1.0, -1.0, 0.5), 0.5);
        assert_eq!(step_toward(0.0, 5.0, f64::INFINITY), 5.0);
        assert_eq!(step_toward(2.0, 0.0, 0.0), 2.0);
    }

    #[test]
    fn test_acceleration_limits_velocity() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.set_accel(1.0);
        for step in 1..=5 {
            wheels.update(1.0, 0.0, WheelPair::default(), 0.1);
            assert_relative_eq!(wheels.velocity(), 0.1 * step as f64, epsilon = 1e-9);
        }
        for _ in 0..10 {
            wheels.update(1.0, 0.0, WheelPair::default(), 0.1);
        }
        assert_relative_eq!(wheels.velocity(), 1.0);
    }

    #[test]
    fn test_turn_limited_by_accel() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.set_accel(1.0);
        assert_eq!(wheels.turn_accel(), 1.0);
        wheels.update(0.0, 2.0, WheelPair::default(), 0.1);
        assert_relative_eq!(wheels.turn(), 0.1, epsilon = 1e-9);
        wheels.update(0.0, 2.0, WheelPair::default(), 0.1);
        assert_relative_eq!(wheels.turn(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_turn_accel_override() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.set_accel(1.0);
        wheels.set_turn_accel(Some(-4.0));
        assert_eq!(wheels.turn_accel(), 4.0);
        wheels.update(0.5, 2.0, WheelPair::default(), 0.1);
        assert_relative_eq!(wheels.velocity(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(wheels.turn(), 0.4, epsilon = 1e-9);

        // back to following the linear limit
        wheels.set_turn_accel(None);
        wheels.set_accel(2.0);
        wheels.update(0.5, 2.0, WheelPair::default(), 0.1);
        assert_relative_eq!(wheels.turn(), 0.6, epsilon = 1e-9);
    }

    #[test]
    fn test_targets_pass_through_ranges() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.set_velocity_range(Range::new(0.8, 0.05, 0.1));
        wheels.set_turn_range(Range::new(1.5, 0.0, 0.0));

        wheels.update(5.0, -9.0, WheelPair::default(), 0.02);
        assert_relative_eq!(wheels.velocity(), 0.8);
        assert_relative_eq!(wheels.turn(), -1.5);

        wheels.update(0.03, 0.0, WheelPair::default(), 0.02);
        assert_eq!(wheels.velocity(), 0.0);

        wheels.update(0.07, 0.0, WheelPair::default(), 0.02);
        assert_relative_eq!(wheels.velocity(), 0.1);
    }

    #[test]
    fn test_wheel_split_follows_turn_sign() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.update(0.5, 1.0, WheelPair::default(), 0.02);
        let targets = wheels.wheel_targets();
        // counter-clockwise turn: right wheel faster
        assert_relative_eq!(targets.left, 0.25);
        assert_relative_eq!(targets.right, 0.75);
    }

    #[test]
    fn test_pid_outputs_mapped_to_output_range() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.set_pid(100.0, 0.0, 0.0);
        wheels.set_output_range(OutputRange::new(200, 10, 30));

        // left error 0.5 -> 50, right error 0.05 -> 5 (inside dead zone)
        wheels.update(0.5, 0.0, WheelPair::new(0.0, 0.45), 0.02);
        assert_eq!(wheels.left_out(), 50);
        assert_eq!(wheels.right_out(), 0);

        // saturates at max
        wheels.update(1.0, 0.0, WheelPair::new(-5.0, 0.85), 0.02);
        assert_eq!(wheels.left_out(), 200);
        // 0.15 * 100 = 15, raised to min
        assert_eq!(wheels.right_out(), 30);
    }

    #[test]
    fn test_reset_clears_command_state() {
        let mut wheels = WheelVelocityController::new(0.5);
        wheels.set_pid(100.0, 10.0, 0.0);
        wheels.update(0.5, 0.2, WheelPair::default(), 0.02);
        assert!(wheels.left_out() != 0);
        wheels.reset();
        assert_eq!(wheels.velocity(), 0.0);
        assert_eq!(wheels.left_out(), 0);
        assert_eq!(wheels.pid_gains(), (100.0, 10.0, 0.0));
    }
}
