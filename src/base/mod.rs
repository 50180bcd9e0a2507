// Motion-control core for a differential-drive base
//
// Provides:
// - Odometry from cumulative wheel encoder counts
// - Per-wheel PID velocity control with acceleration limiting
// - Goal navigation (drive to point, turn to heading, direct velocity)
// - Rate-limited scheduling of the odometry and navigation passes
//
// Sign convention: positive turn is counter-clockwise (heading increases),
// which speeds up the right wheel.

pub mod geometry;
pub mod navigation;
pub mod odometry;
pub mod pid;
pub mod range;
pub mod scheduler;
pub mod velocity;

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{BaseConfig, ConfigError};

pub use navigation::{MotionCommand, NavState, Navigator, Target};
pub use odometry::{EncoderTicks, Odometry, Pose, WheelPair};
pub use range::Range;
pub use scheduler::{DuePasses, Scheduler};
pub use velocity::{OutputRange, WheelVelocityController};

/// A differential-drive base owned and ticked by the host
pub struct RobotBase {
    odometry: Odometry,
    wheels: WheelVelocityController,
    navigator: Navigator,
    scheduler: Scheduler,
}

impl RobotBase {
    /// Create with default limits and the given encoder scale and track width
    pub fn new(ticks_per_unit: f64, width: f64) -> Self {
        Self {
            odometry: Odometry::new(ticks_per_unit, width),
            wheels: WheelVelocityController::new(width),
            navigator: Navigator::new(),
            scheduler: Scheduler::default(),
        }
    }

    /// Create from a validated configuration
    pub fn from_config(config: &BaseConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut base = Self::new(config.ticks_per_unit, config.width);
        base.set_pid(config.pid.p, config.pid.i, config.pid.d);
        base.set_accel(config.accel());
        if let Some(turn_accel) = config.turn_accel {
            base.set_turn_accel(turn_accel);
        }
        base.wheels.set_velocity_range(config.velocity_range);
        base.wheels.set_turn_range(config.turn_range);
        base.wheels.set_output_range(config.output_range);
        base.set_odom_period(config.odom_period());
        base.set_nav_period(config.nav_period());
        base.set_nav_thresh(config.pos_thresh, config.heading_thresh);
        base.set_nav_gains(config.position_gain, config.heading_gain);

        info!(
            "Base configured: width={} tpu={} odom={}ms nav={}ms",
            config.width, config.ticks_per_unit, config.odom_period_ms, config.nav_period_ms
        );
        Ok(base)
    }

    // === Calibration ===

    pub fn set_pid(&mut self, p: f64, i: f64, d: f64) {
        debug!("PID gains: p={} i={} d={}", p, i, d);
        self.wheels.set_pid(p, i, d);
    }

    pub fn set_accel(&mut self, accel: f64) {
        self.wheels.set_accel(accel);
    }

    /// Separate turn acceleration limit (rad/s^2), otherwise `accel` applies to turn too
    pub fn set_turn_accel(&mut self, turn_accel: f64) {
        self.wheels.set_turn_accel(Some(turn_accel));
    }

    pub fn set_max(&mut self, max_velocity: f64, max_turn: f64) {
        self.set_max_vel(max_velocity);
        self.set_max_turn(max_turn);
    }

    pub fn set_max_vel(&mut self, max_velocity: f64) {
        self.wheels.set_max_velocity(max_velocity);
    }

    pub fn set_max_turn(&mut self, max_turn: f64) {
        self.wheels.set_max_turn(max_turn);
    }

    pub fn set_velocity_range(&mut self, max: f64, dead: f64, min: f64) {
        self.wheels.set_velocity_range(Range::new(max, dead, min));
    }

    pub fn set_turn_range(&mut self, max: f64, dead: f64, min: f64) {
        self.wheels.set_turn_range(Range::new(max, dead, min));
    }

    pub fn set_output_range(&mut self, max: i32, dead: i32, min: i32) {
        self.wheels.set_output_range(OutputRange::new(max, dead, min));
    }

    pub fn set_ticks_per_unit(&mut self, ticks_per_unit: f64) {
        self.odometry.set_ticks_per_unit(ticks_per_unit);
    }

    /// Track width, shared by odometry and wheel speed splitting
    pub fn set_width(&mut self, width: f64) {
        self.odometry.set_width(width);
        self.wheels.set_width(width);
    }

    pub fn set_odom_period(&mut self, period: Duration) {
        self.scheduler.set_odom_period(period);
    }

    pub fn set_nav_period(&mut self, period: Duration) {
        self.scheduler.set_nav_period(period);
    }

    pub fn set_nav_thresh(&mut self, pos_thresh: f64, heading_thresh: f64) {
        self.navigator.set_thresholds(pos_thresh, heading_thresh);
    }

    pub fn set_pos_thresh(&mut self, pos_thresh: f64) {
        self.navigator.set_pos_thresh(pos_thresh);
    }

    pub fn set_heading_thresh(&mut self, heading_thresh: f64) {
        self.navigator.set_heading_thresh(heading_thresh);
    }

    pub fn set_nav_gains(&mut self, position_gain: f64, heading_gain: f64) {
        self.navigator.set_gains(position_gain, heading_gain);
    }

    // === Pose access ===

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    pub fn x(&self) -> f64 {
        self.odometry.pose().x
    }

    pub fn y(&self) -> f64 {
        self.odometry.pose().y
    }

    pub fn theta(&self) -> f64 {
        self.odometry.pose().theta
    }

    pub fn set_x(&mut self, x: f64) {
        self.odometry.set_x(x);
    }

    pub fn set_y(&mut self, y: f64) {
        self.odometry.set_y(y);
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.odometry.set_theta(theta);
    }

    pub fn fix_pose(&self) -> Pose {
        self.odometry.fix()
    }

    pub fn fix_x(&self) -> f64 {
        self.odometry.fix().x
    }

    pub fn fix_y(&self) -> f64 {
        self.odometry.fix().y
    }

    pub fn fix_theta(&self) -> f64 {
        self.odometry.fix().theta
    }

    pub fn set_fix_x(&mut self, x: f64) {
        self.odometry.set_fix_x(x);
    }

    pub fn set_fix_y(&mut self, y: f64) {
        self.odometry.set_fix_y(y);
    }

    pub fn set_fix_theta(&mut self, theta: f64) {
        self.odometry.set_fix_theta(theta);
    }

    /// Override x with an external position fix
    pub fn localize_x(&mut self, x: f64) {
        info!("Localize x: {:.3} -> {:.3}", self.x(), x);
        self.odometry.set_x(x);
    }

    pub fn localize_y(&mut self, y: f64) {
        info!("Localize y: {:.3} -> {:.3}", self.y(), y);
        self.odometry.set_y(y);
    }

    pub fn localize_theta(&mut self, theta: f64) {
        info!("Localize theta: {:.3} -> {:.3}", self.theta(), theta);
        self.odometry.set_theta(theta);
    }

    /// Override the whole pose at once
    pub fn set_localization(&mut self, x: f64, y: f64, theta: f64) {
        let pose = Pose::new(x, y, theta);
        info!("Localize pose: {:?} -> {:?}", self.pose(), pose);
        self.odometry.set_pose(pose);
    }

    // === Motion commands ===

    pub fn drive_to(&mut self, x: f64, y: f64, smooth: bool) {
        self.navigator.drive_to(x, y, None, smooth);
    }

    /// Drive to (x, y), then turn to `theta`
    pub fn drive_to_heading(&mut self, x: f64, y: f64, theta: f64, smooth: bool) {
        self.navigator.drive_to(x, y, Some(theta), smooth);
    }

    pub fn turn_to_and_drive(&mut self, x: f64, y: f64, smooth: bool) {
        self.navigator.turn_to_and_drive(x, y, smooth);
    }

    pub fn turn_to(&mut self, theta: f64, smooth: bool) {
        self.navigator.turn_to(theta, smooth);
    }

    /// Turn to face (x, y) from the current position
    pub fn turn_to_point(&mut self, x: f64, y: f64, smooth: bool) {
        let pose = self.pose();
        self.navigator.turn_to_point(x, y, smooth, pose);
    }

    pub fn set_velocity_and_turn(&mut self, velocity: f64, turn: f64) {
        self.navigator.set_velocity_and_turn(velocity, turn);
    }

    /// Clear the goal and bring the base to rest
    ///
    /// The acceleration limit still governs the slow-down in both cases;
    /// a hard stop also discards the wheel PID history.
    pub fn stop(&mut self, smooth: bool) {
        self.navigator.stop();
        if !smooth {
            self.wheels.reset_pid();
        }
    }

    // === Status ===

    /// Measured robot linear velocity
    pub fn velocity(&self) -> f64 {
        self.odometry.velocity()
    }

    /// Measured heading rate
    pub fn turn_rate(&self) -> f64 {
        self.odometry.turn_rate()
    }

    /// Acceleration-limited velocity currently being commanded
    pub fn commanded_velocity(&self) -> f64 {
        self.wheels.velocity()
    }

    /// Acceleration-limited turn currently being commanded
    pub fn commanded_turn(&self) -> f64 {
        self.wheels.turn()
    }

    /// Target produced by navigation before range mapping and acceleration limiting
    pub fn nav_command(&self) -> MotionCommand {
        self.navigator.command()
    }

    pub fn wheel_velocities(&self) -> WheelPair {
        self.odometry.wheel_velocities()
    }

    pub fn distance_sums(&self) -> WheelPair {
        self.odometry.distance_sums()
    }

    pub fn left_out(&self) -> i32 {
        self.wheels.left_out()
    }

    pub fn right_out(&self) -> i32 {
        self.wheels.right_out()
    }

    pub fn nav_state(&self) -> NavState {
        self.navigator.state()
    }

    pub fn nav_done(&self) -> bool {
        self.navigator.nav_done()
    }

    // === Lifecycle ===

    /// Zero pose, goal and kinematic state; calibration is kept
    pub fn reset(&mut self) {
        info!("Resetting base state");
        self.odometry.reset();
        self.wheels.reset();
        self.navigator.stop();
        self.scheduler.reset();
    }

    /// Scheduler tick using the monotonic clock
    pub fn update(&mut self, ticks: EncoderTicks) {
        self.update_at(Instant::now(), ticks);
    }

    /// Scheduler tick at an explicit time
    pub fn update_at(&mut self, now: Instant, ticks: EncoderTicks) -> DuePasses {
        let due = self.scheduler.poll(now);

        if let Some(dt) = due.odometry {
            self.odometry.update(ticks, dt);
        }

        if let Some(dt) = due.navigation {
            let velocity_max = self.wheels.velocity_range().max;
            let turn_max = self.wheels.turn_range().max;
            let command = self.navigator.evaluate(self.odometry.pose(), velocity_max, turn_max);
            self.wheels
                .update(command.velocity, command.turn, self.odometry.wheel_velocities(), dt);
        }

        due
    }
}
