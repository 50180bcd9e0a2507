// Navigation state machine
// Turns the active goal and the live pose into a (velocity, turn) command each
// navigation cycle, and decides when the goal is satisfied.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::geometry::{angle_error, bearing, distance, normalize_angle};
use super::odometry::Pose;

pub const DEFAULT_POS_THRESH: f64 = 0.05;
pub const DEFAULT_HEADING_THRESH: f64 = 0.05;
pub const DEFAULT_POSITION_GAIN: f64 = 2.0;
pub const DEFAULT_HEADING_GAIN: f64 = 4.0;

/// Goal position in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub x: f64,
    pub y: f64,
}

impl Target {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Body velocity command handed to the wheel controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub velocity: f64,
    pub turn: f64,
}

impl MotionCommand {
    pub fn new(velocity: f64, turn: f64) -> Self {
        Self { velocity, turn }
    }
}

/// What the base is currently trying to do
///
/// `smooth` selects a proportional turn law; otherwise turns are commanded at
/// the maximum turn rate until the heading threshold is met.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NavState {
    /// No goal; the last command (zero after completion or stop) is held
    Idle,
    Turning {
        heading: f64,
        smooth: bool,
    },
    /// Face the target before translating toward it
    TurnThenDrive {
        target: Target,
        final_heading: Option<f64>,
        smooth: bool,
    },
    Driving {
        target: Target,
        final_heading: Option<f64>,
        smooth: bool,
    },
    /// Raw velocity/turn supplied by the caller, no goal logic
    DirectVelocity {
        velocity: f64,
        turn: f64,
    },
}

pub struct Navigator {
    state: NavState,
    command: MotionCommand,

    pos_thresh: f64,
    heading_thresh: f64,
    position_gain: f64,
    heading_gain: f64,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            state: NavState::Idle,
            command: MotionCommand::default(),
            pos_thresh: DEFAULT_POS_THRESH,
            heading_thresh: DEFAULT_HEADING_THRESH,
            position_gain: DEFAULT_POSITION_GAIN,
            heading_gain: DEFAULT_HEADING_GAIN,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// Command produced by the last evaluation (or set directly)
    pub fn command(&self) -> MotionCommand {
        self.command
    }

    pub fn set_thresholds(&mut self, pos_thresh: f64, heading_thresh: f64) {
        self.pos_thresh = pos_thresh;
        self.heading_thresh = heading_thresh;
    }

    pub fn set_pos_thresh(&mut self, pos_thresh: f64) {
        self.pos_thresh = pos_thresh;
    }

    pub fn set_heading_thresh(&mut self, heading_thresh: f64) {
        self.heading_thresh = heading_thresh;
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.pos_thresh, self.heading_thresh)
    }

    /// Proportional gains: velocity per unit of distance, turn per radian of error
    pub fn set_gains(&mut self, position_gain: f64, heading_gain: f64) {
        self.position_gain = position_gain;
        self.heading_gain = heading_gain;
    }

    pub fn gains(&self) -> (f64, f64) {
        (self.position_gain, self.heading_gain)
    }

    pub fn turn_to(&mut self, theta: f64, smooth: bool) {
        let heading = normalize_angle(theta);
        info!("Turn to heading {:.3} (smooth={})", heading, smooth);
        self.set_goal(NavState::Turning { heading, smooth });
    }

    /// Turn to face (x, y) as seen from `pose`
    pub fn turn_to_point(&mut self, x: f64, y: f64, smooth: bool, pose: Pose) {
        let heading = bearing(pose.x, pose.y, x, y).unwrap_or(pose.theta);
        info!("Turn to face ({:.3}, {:.3}) -> heading {:.3}", x, y, heading);
        self.set_goal(NavState::Turning { heading, smooth });
    }

    /// Blended steering when `smooth`, otherwise turn in place first
    pub fn drive_to(&mut self, x: f64, y: f64, final_heading: Option<f64>, smooth: bool) {
        let target = Target::new(x, y);
        let final_heading = final_heading.map(normalize_angle);
        info!(
            "Drive to ({:.3}, {:.3}) heading={:?} (smooth={})",
            x, y, final_heading, smooth
        );
        let goal = if smooth {
            NavState::Driving {
                target,
                final_heading,
                smooth,
            }
        } else {
            NavState::TurnThenDrive {
                target,
                final_heading,
                smooth,
            }
        };
        self.set_goal(goal);
    }

    /// Always aligns with the target before moving
    pub fn turn_to_and_drive(&mut self, x: f64, y: f64, smooth: bool) {
        info!("Turn to and drive to ({:.3}, {:.3}) (smooth={})", x, y, smooth);
        self.set_goal(NavState::TurnThenDrive {
            target: Target::new(x, y),
            final_heading: None,
            smooth,
        });
    }

    pub fn set_velocity_and_turn(&mut self, velocity: f64, turn: f64) {
        debug!("Direct velocity command: vel={:.3} turn={:.3}", velocity, turn);
        self.state = NavState::DirectVelocity { velocity, turn };
        self.command = MotionCommand::new(velocity, turn);
    }

    /// Drop any goal and command zero motion
    pub fn stop(&mut self) {
        if self.state != NavState::Idle {
            info!("Stopping from {:?}", self.state);
        }
        self.state = NavState::Idle;
        self.command = MotionCommand::default();
    }

    pub fn nav_done(&self) -> bool {
        matches!(self.state, NavState::Idle)
    }

    pub fn is_driving(&self) -> bool {
        matches!(self.state, NavState::Driving { .. })
    }

    pub fn is_turning(&self) -> bool {
        matches!(
            self.state,
            NavState::Turning { .. } | NavState::TurnThenDrive { .. }
        )
    }

    pub fn is_turn_first(&self) -> bool {
        matches!(self.state, NavState::TurnThenDrive { .. })
    }

    pub fn is_direct_velocity(&self) -> bool {
        matches!(self.state, NavState::DirectVelocity { .. })
    }

    /// Last caller wins: any previous goal is discarded
    fn set_goal(&mut self, goal: NavState) {
        self.state = goal;
    }

    /// Evaluate the active goal against the current pose
    ///
    /// Completed phases fall through to the next phase within the same call,
    /// so a goal that is already satisfied finishes immediately.
    pub fn evaluate(&mut self, pose: Pose, max_velocity: f64, max_turn: f64) -> MotionCommand {
        // Longest chain: TurnThenDrive -> Driving -> Turning -> Idle
        for _ in 0..4 {
            match self.step(pose, max_velocity, max_turn) {
                Some(next) => {
                    debug!("Navigation transition {:?} -> {:?}", self.state, next);
                    self.state = next;
                    if next == NavState::Idle {
                        info!("Goal reached at ({:.3}, {:.3}, {:.3})", pose.x, pose.y, pose.theta);
                        self.command = MotionCommand::default();
                    }
                }
                None => break,
            }
        }
        self.command
    }

    /// One evaluation of the current state; returns the next state on a transition
    fn step(&mut self, pose: Pose, max_velocity: f64, max_turn: f64) -> Option<NavState> {
        match self.state {
            NavState::Idle => None,
            NavState::DirectVelocity { velocity, turn } => {
                self.command = MotionCommand::new(velocity, turn);
                None
            }
            NavState::Turning { heading, smooth } => {
                let error = angle_error(heading, pose.theta);
                if error.abs() < self.heading_thresh {
                    return Some(NavState::Idle);
                }
                self.command = MotionCommand::new(0.0, self.turn_law(error, smooth, max_turn));
                None
            }
            NavState::TurnThenDrive {
                target,
                final_heading,
                smooth,
            } => {
                // Already there: no point spinning toward a target inside the threshold
                let remaining = distance(pose.x, pose.y, target.x, target.y);
                let heading = bearing(pose.x, pose.y, target.x, target.y).unwrap_or(pose.theta);
                let error = angle_error(heading, pose.theta);
                if remaining < self.pos_thresh || error.abs() < self.heading_thresh {
                    return Some(NavState::Driving {
                        target,
                        final_heading,
                        smooth,
                    });
                }
                self.command = MotionCommand::new(0.0, self.turn_law(error, smooth, max_turn));
                None
            }
            NavState::Driving {
                target,
                final_heading,
                smooth,
            } => {
                let remaining = distance(pose.x, pose.y, target.x, target.y);
                if remaining < self.pos_thresh {
                    return Some(match final_heading {
                        Some(heading) => NavState::Turning { heading, smooth },
                        None => NavState::Idle,
                    });
                }
                let heading = bearing(pose.x, pose.y, target.x, target.y).unwrap_or(pose.theta);
                let error = angle_error(heading, pose.theta);

                // Slow down while the target is off to the side, never reverse into it
                let velocity = (self.position_gain * remaining).min(max_velocity) * error.cos().max(0.0);
                let turn = self.heading_gain * error;
                self.command = MotionCommand::new(velocity, turn);
                None
            }
        }
    }

    fn turn_law(&self, error: f64, smooth: bool, max_turn: f64) -> f64 {
        if smooth || !max_turn.is_finite() {
            self.heading_gain * error
        } else {
            max_turn.copysign(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    const MAX_VEL: f64 = 1.0;
    const MAX_TURN: f64 = 2.0;

    #[test]
    fn test_idle_is_done() {
        let mut nav = Navigator::new();
        assert!(nav.nav_done());
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert_eq!(cmd, MotionCommand::default());
    }

    #[test]
    fn test_turn_commands_zero_velocity() {
        let mut nav = Navigator::new();
        nav.turn_to(PI / 2.0, false);
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert_eq!(cmd.velocity, 0.0);
        assert_eq!(cmd.turn, MAX_TURN);
        assert!(!nav.nav_done());
        assert!(nav.is_turning());

        // clockwise when the target is to the right
        nav.turn_to(-PI / 2.0, true);
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert_relative_eq!(cmd.turn, -DEFAULT_HEADING_GAIN * PI / 2.0);
    }

    #[test]
    fn test_turn_threshold_is_strict() {
        let mut nav = Navigator::new();
        nav.set_heading_thresh(0.1);
        nav.turn_to(0.1, true);
        nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert!(!nav.nav_done(), "error exactly at threshold is not done");

        nav.evaluate(Pose::new(0.0, 0.0, 0.01), MAX_VEL, MAX_TURN);
        assert!(nav.nav_done());
        assert_eq!(nav.command(), MotionCommand::default());
    }

    #[test]
    fn test_turn_to_point_uses_bearing() {
        let mut nav = Navigator::new();
        nav.turn_to_point(1.0, 1.0, true, Pose::new(0.0, 0.0, 0.0));
        match nav.state() {
            NavState::Turning { heading, .. } => assert_relative_eq!(heading, PI / 4.0),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_non_smooth_drive_turns_first() {
        let mut nav = Navigator::new();
        nav.drive_to(0.0, 5.0, None, false);
        assert!(nav.is_turn_first());

        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert_eq!(cmd.velocity, 0.0);
        assert!(cmd.turn > 0.0);

        // facing the target: switches to driving in the same cycle
        let cmd = nav.evaluate(Pose::new(0.0, 0.0, PI / 2.0), MAX_VEL, MAX_TURN);
        assert!(nav.is_driving());
        assert_relative_eq!(cmd.velocity, MAX_VEL);
        assert_relative_eq!(cmd.turn, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_smooth_drive_blends_heading_correction() {
        let mut nav = Navigator::new();
        nav.drive_to(10.0, 0.0, None, true);
        assert!(nav.is_driving());

        let far_off = nav.evaluate(Pose::new(0.0, 0.0, 0.3), MAX_VEL, MAX_TURN);
        let near_on = nav.evaluate(Pose::new(5.0, 0.0, 0.05), MAX_VEL, MAX_TURN);
        println!("turn: {} -> {}", far_off.turn, near_on.turn);
        assert!(far_off.velocity > 0.0);
        assert!(far_off.turn < 0.0);
        assert!(near_on.turn.abs() < far_off.turn.abs());
    }

    #[test]
    fn test_drive_velocity_tapers_near_target() {
        let mut nav = Navigator::new();
        nav.drive_to(1.0, 0.0, None, true);
        let cmd = nav.evaluate(Pose::new(0.8, 0.0, 0.0), MAX_VEL, MAX_TURN);
        assert_relative_eq!(cmd.velocity, DEFAULT_POSITION_GAIN * 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_target_behind_does_not_reverse() {
        let mut nav = Navigator::new();
        nav.drive_to(-3.0, 0.0, None, true);
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert!(cmd.velocity.abs() < 1e-12);
        assert!(cmd.turn.abs() > 0.0);
    }

    #[test]
    fn test_final_heading_turn_after_arrival() {
        let mut nav = Navigator::new();
        nav.drive_to(1.0, 0.0, Some(PI / 2.0), true);
        nav.evaluate(Pose::new(0.99, 0.0, 0.0), MAX_VEL, MAX_TURN);
        match nav.state() {
            NavState::Turning { heading, .. } => assert_relative_eq!(heading, PI / 2.0),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(!nav.nav_done());

        nav.evaluate(Pose::new(0.99, 0.0, PI / 2.0 - 0.01), MAX_VEL, MAX_TURN);
        assert!(nav.nav_done());
    }

    #[test]
    fn test_zero_distance_goal_completes_immediately() {
        let pose = Pose::new(2.0, -1.0, 0.7);
        for smooth in [true, false] {
            let mut nav = Navigator::new();
            nav.drive_to(pose.x, pose.y, None, smooth);
            let cmd = nav.evaluate(pose, MAX_VEL, MAX_TURN);
            assert!(nav.nav_done(), "smooth={} not done", smooth);
            assert_eq!(cmd, MotionCommand::default());
            assert!(cmd.turn.is_finite());
        }
    }

    #[test]
    fn test_turn_first_goal_inside_threshold_skips_alignment() {
        let mut nav = Navigator::new();
        // target 1cm to the left: bearing is 90 degrees off, but it is already reached
        nav.drive_to(0.0, 0.01, None, false);
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert!(nav.nav_done());
        assert_eq!(cmd, MotionCommand::default());

        // with a final heading it goes straight to the final turn
        nav.drive_to(0.0, 0.01, Some(PI), false);
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert_eq!(
            nav.state(),
            NavState::Turning {
                heading: PI,
                smooth: false
            }
        );
        assert_eq!(cmd, MotionCommand::new(0.0, MAX_TURN));
    }

    #[test]
    fn test_turn_to_and_drive_turns_first_even_when_smooth() {
        let mut nav = Navigator::new();
        nav.turn_to_and_drive(0.0, -2.0, true);
        assert_eq!(
            nav.state(),
            NavState::TurnThenDrive {
                target: Target::new(0.0, -2.0),
                final_heading: None,
                smooth: true,
            }
        );

        // proportional turn toward the target, no forward motion yet
        let cmd = nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert!(nav.is_turn_first());
        assert_eq!(cmd.velocity, 0.0);
        assert_relative_eq!(cmd.turn, -DEFAULT_HEADING_GAIN * PI / 2.0);

        let cmd = nav.evaluate(Pose::new(0.0, 0.0, -PI / 2.0 + 0.01), MAX_VEL, MAX_TURN);
        assert!(nav.is_driving());
        assert!(cmd.velocity > 0.0);
    }

    #[test]
    fn test_thresholds_and_gains() {
        let mut nav = Navigator::new();
        assert_eq!(nav.thresholds(), (DEFAULT_POS_THRESH, DEFAULT_HEADING_THRESH));
        assert_eq!(nav.gains(), (DEFAULT_POSITION_GAIN, DEFAULT_HEADING_GAIN));

        nav.set_thresholds(0.2, 0.1);
        nav.set_pos_thresh(0.3);
        assert_eq!(nav.thresholds(), (0.3, 0.1));
        nav.set_heading_thresh(0.02);
        assert_eq!(nav.thresholds(), (0.3, 0.02));

        nav.set_gains(1.5, 3.0);
        assert_eq!(nav.gains(), (1.5, 3.0));
        nav.drive_to(1.0, 0.0, None, true);
        let cmd = nav.evaluate(Pose::new(0.5, 0.0, 0.0), MAX_VEL, MAX_TURN);
        assert_relative_eq!(cmd.velocity, 0.75);
    }

    #[test]
    fn test_new_goal_replaces_old() {
        let mut nav = Navigator::new();
        nav.drive_to(5.0, 5.0, Some(1.0), true);
        nav.drive_to(-2.0, 0.0, None, false);
        assert_eq!(
            nav.state(),
            NavState::TurnThenDrive {
                target: Target::new(-2.0, 0.0),
                final_heading: None,
                smooth: false,
            }
        );
    }

    #[test]
    fn test_direct_velocity_is_not_done() {
        let mut nav = Navigator::new();
        nav.set_velocity_and_turn(0.3, -0.2);
        let cmd = nav.evaluate(Pose::new(4.0, 4.0, 1.0), MAX_VEL, MAX_TURN);
        assert_eq!(cmd, MotionCommand::new(0.3, -0.2));
        assert!(!nav.nav_done());
        assert!(nav.is_direct_velocity());

        nav.stop();
        assert!(nav.nav_done());
        assert_eq!(nav.command(), MotionCommand::default());
    }

    #[test]
    fn test_stop_clears_driving() {
        let mut nav = Navigator::new();
        nav.drive_to(10.0, 0.0, None, true);
        nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN);
        assert!(nav.is_driving());
        nav.stop();
        assert!(!nav.is_driving());
        assert!(!nav.is_turning());
        assert_eq!(nav.evaluate(Pose::default(), MAX_VEL, MAX_TURN), MotionCommand::default());
    }
}
