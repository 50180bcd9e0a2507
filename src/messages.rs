// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::base::{NavState, RobotBase};

fn default_smooth() -> bool {
    true
}

// Command from teleop/scripts -> runtime
// Internally tagged: {"cmd": "drive_to", "x": 1.0, "y": 0.5}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum NavCommand {
    DriveTo {
        x: f64,
        y: f64,
        /// Final heading to turn to after arriving
        #[serde(default)]
        theta: Option<f64>,
        #[serde(default = "default_smooth")]
        smooth: bool,
    },
    TurnTo {
        theta: f64,
        #[serde(default = "default_smooth")]
        smooth: bool,
    },
    TurnToPoint {
        x: f64,
        y: f64,
        #[serde(default = "default_smooth")]
        smooth: bool,
    },
    TurnToAndDrive {
        x: f64,
        y: f64,
        #[serde(default = "default_smooth")]
        smooth: bool,
    },
    Velocity {
        velocity: f64,
        turn: f64,
    },
    Stop {
        #[serde(default = "default_smooth")]
        smooth: bool,
    },
    Localize {
        x: f64,
        y: f64,
        theta: f64,
    },
    Reset,
}

impl NavCommand {
    /// Hand the command to the base; a new goal replaces the current one
    pub fn apply(&self, base: &mut RobotBase) {
        match *self {
            NavCommand::DriveTo {
                x,
                y,
                theta: Some(theta),
                smooth,
            } => base.drive_to_heading(x, y, theta, smooth),
            NavCommand::DriveTo {
                x,
                y,
                theta: None,
                smooth,
            } => base.drive_to(x, y, smooth),
            NavCommand::TurnTo { theta, smooth } => base.turn_to(theta, smooth),
            NavCommand::TurnToPoint { x, y, smooth } => base.turn_to_point(x, y, smooth),
            NavCommand::TurnToAndDrive { x, y, smooth } => base.turn_to_and_drive(x, y, smooth),
            NavCommand::Velocity { velocity, turn } => base.set_velocity_and_turn(velocity, turn),
            NavCommand::Stop { smooth } => base.stop(smooth),
            NavCommand::Localize { x, y, theta } => base.set_localization(x, y, theta),
            NavCommand::Reset => base.reset(),
        }
    }
}

// Actuation output from runtime -> motor drivers
// Has default values because we don't always have an actuation to send
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MotorActuation {
    pub left: i32,
    pub right: i32,
}

impl From<&RobotBase> for MotorActuation {
    fn from(base: &RobotBase) -> Self {
        Self {
            left: base.left_out(),
            right: base.right_out(),
        }
    }
}

/// Pose and navigation status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PoseReport {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub velocity: f64,
    pub turn_rate: f64,
    pub nav_done: bool,
    pub nav: NavState,
}

impl From<&RobotBase> for PoseReport {
    fn from(base: &RobotBase) -> Self {
        let pose = base.pose();
        Self {
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            velocity: base.velocity(),
            turn_rate: base.turn_rate(),
            nav_done: base.nav_done(),
            nav: base.nav_state(),
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
