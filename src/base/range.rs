// Range-with-deadband mapping used for velocity, turn and motor output commands

use serde::{Deserialize, Serialize};

/// Magnitude limits applied to a signed command
///
/// A magnitude below `dead` is suppressed to zero, anything else is clamped
/// into `[min, max]`. The sign of the command is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub max: f64,
    pub dead: f64,
    pub min: f64,
}

impl Range {
    pub const fn new(max: f64, dead: f64, min: f64) -> Self {
        Self { max, dead, min }
    }

    /// Range that only clamps to `max`
    pub const fn symmetric(max: f64) -> Self {
        Self::new(max, 0.0, 0.0)
    }

    /// Map a command through the deadband and limits
    pub fn apply(&self, value: f64) -> f64 {
        let magnitude = value.abs();
        if magnitude < self.dead || magnitude == 0.0 || value.is_nan() {
            return 0.0;
        }
        // max wins if the range was configured with min > max
        let clamped = magnitude.max(self.min).min(self.max);
        clamped.copysign(value)
    }

    /// Map and round to an integer motor command
    pub fn apply_output(&self, value: f64) -> i32 {
        self.apply(value).round() as i32
    }

    /// True when the limits are usable: `max >= dead >= 0` and `max >= min >= 0`
    pub fn is_well_formed(&self) -> bool {
        let finite = self.dead.is_finite() && self.min.is_finite() && !self.max.is_nan();
        finite && self.dead >= 0.0 && self.min >= 0.0 && self.max >= self.dead && self.max >= self.min
    }
}
