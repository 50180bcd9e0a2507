// Motion-control runtime for a differential-drive base
//
// - base: odometry, wheel velocity control, navigation, scheduling
// - config: calibration and runtime constants
// - messages / runtime: zenoh command and telemetry loop
// - sim: simulated wheels for running without hardware

pub mod base;
pub mod config;
pub mod messages;
pub mod runtime;
pub mod sim;

pub use base::RobotBase;
pub use config::BaseConfig;
