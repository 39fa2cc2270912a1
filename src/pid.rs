//! Proportional-integral-derivative feedback unit.

use serde::{Deserialize, Serialize};

/// Bound on the accumulated integral term, in error-seconds.
pub const INTEGRAL_LIMIT: f32 = 20.0;

/// Gain vector for a [`PidController`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl PidGains {
    pub const fn new(p: f32, i: f32, d: f32) -> Self {
        Self { p, i, d }
    }

    /// Returns the gains multiplied component-wise by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.p * factor, self.i * factor, self.d * factor)
    }
}

/// Stateful PID loop.
///
/// There is no reset: each independent control loop owns a fresh controller.
/// Gains are passed per call so callers can adapt them tick by tick.
#[derive(Clone, Debug, Default)]
pub struct PidController {
    previous_error: f32,
    integral_sum: f32,
}

impl PidController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one error sample and returns the controller output.
    ///
    /// The integral is clamped to `±INTEGRAL_LIMIT` before it is weighted, and
    /// the derivative is the finite difference against the previous sample.
    pub fn output(&mut self, gains: PidGains, error: f32, dt: f32) -> f32 {
        self.integral_sum = (self.integral_sum + error * dt).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let derivative = (error - self.previous_error) / dt;
        self.previous_error = error;

        gains.p * error + gains.i * self.integral_sum + gains.d * derivative
    }

    pub fn integral_sum(&self) -> f32 {
        self.integral_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_uses_previous_sample() {
        let mut pid = PidController::new();
        let gains = PidGains::new(0.0, 0.0, 1.0);
        assert!((pid.output(gains, 1.0, 0.5) - 2.0).abs() < 1e-6);
        assert!(pid.output(gains, 1.0, 0.5).abs() < 1e-6);
        assert!((pid.output(gains, 0.0, 0.5) + 2.0).abs() < 1e-6);
    }

    #[test]
    fn scaled_gains() {
        let g = PidGains::new(2.0, 3.0, 2.0).scaled(2.0);
        assert_eq!(g, PidGains::new(4.0, 6.0, 4.0));
    }
}
