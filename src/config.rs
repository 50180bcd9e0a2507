// Timeouts, topics, base calibration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::base::navigation::{
    DEFAULT_HEADING_GAIN, DEFAULT_HEADING_THRESH, DEFAULT_POS_THRESH, DEFAULT_POSITION_GAIN,
};
use crate::base::range::Range;
use crate::base::velocity::{
    DEFAULT_MAX_OUTPUT, DEFAULT_MAX_TURN, DEFAULT_MAX_VELOCITY, OutputRange,
};

// Runtime loop frequency; must be well above 1 / odom_period
pub const LOOP_HZ: u64 = 200;

// Pose/health publish rate
pub const TELEMETRY_HZ: u64 = 50;

// Command timeout for watchdog (direct velocity commands only)
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_NAV: &str = "diffbase/cmd/nav"; // commands
pub const TOPIC_RT_MOTORS: &str = "diffbase/rt/motors"; // actuation
pub const TOPIC_POSE: &str = "diffbase/state/pose"; // pose + navigation status
pub const TOPIC_HEALTH: &str = "diffbase/state/health"; // health status

/// Errors raised while loading or validating a base configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

/// Calibration for the base, set once before the control loop starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    pub pid: PidGains,
    /// Linear acceleration limit (units/s^2); absent means unlimited
    pub accel: Option<f64>,
    /// Turn acceleration limit (rad/s^2); absent follows `accel`
    pub turn_accel: Option<f64>,

    pub velocity_range: Range,
    pub turn_range: Range,
    pub output_range: OutputRange,

    pub ticks_per_unit: f64,
    /// Track width, distance between the wheels (units)
    pub width: f64,

    pub odom_period_ms: u64,
    pub nav_period_ms: u64,

    pub pos_thresh: f64,
    pub heading_thresh: f64,
    pub position_gain: f64,
    pub heading_gain: f64,
}

impl Default for BaseConfig {
    fn default() -> Self {
        // Gains suit the simulated base at its default scale
        Self {
            pid: PidGains {
                p: 60.0,
                i: 300.0,
                d: 0.0,
            },
            accel: Some(2.0),
            turn_accel: None,
            velocity_range: Range::symmetric(DEFAULT_MAX_VELOCITY),
            turn_range: Range::symmetric(DEFAULT_MAX_TURN),
            output_range: OutputRange::new(DEFAULT_MAX_OUTPUT, 0, 0),
            ticks_per_unit: 1000.0,
            width: 0.3,
            odom_period_ms: 10,
            nav_period_ms: 20,
            pos_thresh: DEFAULT_POS_THRESH,
            heading_thresh: DEFAULT_HEADING_THRESH,
            position_gain: DEFAULT_POSITION_GAIN,
            heading_gain: DEFAULT_HEADING_GAIN,
        }
    }
}

impl BaseConfig {
    /// Read a JSON config file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: BaseConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn odom_period(&self) -> Duration {
        Duration::from_millis(self.odom_period_ms)
    }

    pub fn nav_period(&self) -> Duration {
        Duration::from_millis(self.nav_period_ms)
    }

    pub fn accel(&self) -> f64 {
        self.accel.unwrap_or(f64::INFINITY)
    }

    /// Reject calibration the control loop cannot run with
    pub fn validate(&self) -> Result<()> {
        positive("ticks_per_unit", self.ticks_per_unit)?;
        positive("width", self.width)?;
        positive("pos_thresh", self.pos_thresh)?;
        positive("heading_thresh", self.heading_thresh)?;
        non_negative("position_gain", self.position_gain)?;
        non_negative("heading_gain", self.heading_gain)?;
        if let Some(accel) = self.accel {
            non_negative("accel", accel)?;
        }
        if let Some(turn_accel) = self.turn_accel {
            non_negative("turn_accel", turn_accel)?;
        }
        for (field, value) in [("pid.p", self.pid.p), ("pid.i", self.pid.i), ("pid.d", self.pid.d)] {
            if !value.is_finite() {
                return Err(invalid(field, format!("{} is not finite", value)));
            }
        }

        well_formed("velocity_range", &self.velocity_range)?;
        well_formed("turn_range", &self.turn_range)?;
        well_formed("output_range", &self.output_range.as_range())?;

        if self.odom_period_ms == 0 {
            return Err(invalid("odom_period_ms", "must be at least 1".to_string()));
        }
        if self.nav_period_ms == 0 {
            return Err(invalid("nav_period_ms", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} must be positive and finite", value)))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} must not be negative", value)))
    }
}

fn well_formed(field: &'static str, range: &Range) -> Result<()> {
    if range.is_well_formed() {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!(
                "need max >= dead >= 0 and max >= min >= 0, got ({}, {}, {})",
                range.max, range.dead, range.min
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        BaseConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_width() {
        let config = BaseConfig {
            width: 0.0,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "width"),
            other => panic!("expected width error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let config = BaseConfig {
            turn_range: Range::new(1.0, -0.1, 0.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BaseConfig {
            output_range: OutputRange::new(100, 150, 0),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        println!("{}", err);
        assert!(err.to_string().contains("output_range"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "width": 0.42,
            "accel": null,
            "output_range": { "max": 1000, "dead": 5, "min": 40 }
        }"#;
        let config: BaseConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.width, 0.42);
        assert_eq!(config.accel(), f64::INFINITY);
        assert_eq!(config.turn_accel, None);
        assert_eq!(config.output_range, OutputRange::new(1000, 5, 40));
        assert_eq!(config.ticks_per_unit, BaseConfig::default().ticks_per_unit);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("diffbase-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "ticks_per_unit": 0 }"#).unwrap();
        let result = BaseConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Invalid { field: "ticks_per_unit", .. })));

        assert!(matches!(
            BaseConfig::load("/nonexistent/diffbase.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
