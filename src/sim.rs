// Simulated two-wheel base
// Stands in for motor drivers and encoders when no hardware is attached.

use std::time::Instant;

use tracing::debug;

use crate::base::odometry::{EncoderTicks, WheelPair};

/// Motor outputs in, cumulative encoder counts out
pub trait BaseHardware {
    fn read_encoders(&mut self) -> EncoderTicks;
    fn write_outputs(&mut self, left: i32, right: i32);
}

/// Wheel speed scale: units/s per unit of motor output
pub const DEFAULT_UNITS_PER_OUTPUT: f64 = 0.01;
/// First-order motor response time constant (seconds)
pub const DEFAULT_TIME_CONSTANT: f64 = 0.05;

pub struct SimulatedBase {
    ticks_per_unit: f64,
    units_per_output: f64,
    time_constant: f64,

    outputs: (i32, i32),
    velocity: WheelPair,
    position: WheelPair,

    last_read: Option<Instant>,
}

impl SimulatedBase {
    pub fn new(ticks_per_unit: f64) -> Self {
        Self::with_params(ticks_per_unit, DEFAULT_UNITS_PER_OUTPUT, DEFAULT_TIME_CONSTANT)
    }

    pub fn with_params(ticks_per_unit: f64, units_per_output: f64, time_constant: f64) -> Self {
        Self {
            ticks_per_unit,
            units_per_output,
            time_constant,
            outputs: (0, 0),
            velocity: WheelPair::default(),
            position: WheelPair::default(),
            last_read: None,
        }
    }

    /// Advance the wheel physics by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let blend = if self.time_constant > 0.0 {
            1.0 - (-dt / self.time_constant).exp()
        } else {
            1.0
        };
        let target_left = self.outputs.0 as f64 * self.units_per_output;
        let target_right = self.outputs.1 as f64 * self.units_per_output;
        self.velocity.left += (target_left - self.velocity.left) * blend;
        self.velocity.right += (target_right - self.velocity.right) * blend;
        self.position.left += self.velocity.left * dt;
        self.position.right += self.velocity.right * dt;
    }

    /// Encoder counts for the current wheel positions, truncated toward zero
    pub fn encoders(&self) -> EncoderTicks {
        EncoderTicks::new(
            (self.position.left * self.ticks_per_unit) as i64,
            (self.position.right * self.ticks_per_unit) as i64,
        )
    }

    pub fn outputs(&self) -> (i32, i32) {
        self.outputs
    }

    pub fn wheel_velocities(&self) -> WheelPair {
        self.velocity
    }
}

impl BaseHardware for SimulatedBase {
    fn read_encoders(&mut self) -> EncoderTicks {
        let now = Instant::now();
        if let Some(last) = self.last_read {
            self.step(now.duration_since(last).as_secs_f64());
        }
        self.last_read = Some(now);
        self.encoders()
    }

    fn write_outputs(&mut self, left: i32, right: i32) {
        if (left, right) != self.outputs {
            debug!("Simulated outputs: left={}, right={}", left, right);
        }
        self.outputs = (left, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_velocity_settles_to_scaled_output() {
        let mut sim = SimulatedBase::new(1000.0);
        sim.write_outputs(100, -50);
        for _ in 0..200 {
            sim.step(0.005);
        }
        let v = sim.wheel_velocities();
        assert_relative_eq!(v.left, 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.right, -0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_encoders_are_symmetric() {
        let mut sim = SimulatedBase::new(1000.0);
        sim.write_outputs(-37, 37);
        for _ in 0..100 {
            sim.step(0.005);
        }
        let ticks = sim.encoders();
        println!("Encoders: {:?}", ticks);
        assert!(ticks.right > 0);
        assert_eq!(ticks.left, -ticks.right);
    }

    #[test]
    fn test_zero_time_constant_is_instant() {
        let mut sim = SimulatedBase::with_params(100.0, 0.5, 0.0);
        sim.write_outputs(4, 4);
        sim.step(0.5);
        assert_eq!(sim.encoders(), EncoderTicks::new(100, 100));
    }
}
