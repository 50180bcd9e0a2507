// PID controller driving one wheel's motor output toward its target velocity

/// Proportional-integral-derivative controller with bounded output
///
/// The integral is clamped to the span that can still move the output,
/// so a saturated wheel does not wind up.
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,

    integral: f64,
    last_error: Option<f64>,

    output_min: f64,
    output_max: f64,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            last_error: None,
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
        }
    }

    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    /// Set output limits
    pub fn set_output_limits(&mut self, min: f64, max: f64) {
        self.output_min = min;
        self.output_max = max;
    }

    /// Clear integral and derivative history
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Compute control output
    ///
    /// # Arguments
    /// * `setpoint` - Desired value
    /// * `measured` - Current measured value
    /// * `dt` - Time step (seconds), non-positive steps only apply the P term
    pub fn compute(&mut self, setpoint: f64, measured: f64, dt: f64) -> f64 {
        let error = setpoint - measured;
        let p_term = self.kp * error;

        if dt <= 0.0 {
            return p_term.clamp(self.output_min, self.output_max);
        }

        // Integral with anti-windup
        self.integral += error * dt;
        if self.ki != 0.0 {
            let (lo, hi) = (self.output_min / self.ki, self.output_max / self.ki);
            self.integral = self.integral.clamp(lo.min(hi), lo.max(hi));
        }
        let i_term = self.ki * self.integral;

        // No derivative kick on the first sample
        let derivative = match self.last_error {
            Some(last) => (error - last) / dt,
            None => 0.0,
        };
        let d_term = self.kd * derivative;
        self.last_error = Some(error);

        (p_term + i_term + d_term).clamp(self.output_min, self.output_max)
    }
}
