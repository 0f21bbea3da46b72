use super::DynamicalSystem;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Logistic system `xd = r x (1 - x/K)`.
///
/// `K` is chosen so that the inflection point (where `x = K/2`) lies at
/// `inflection_ratio * tau`. With a negative rate the system decays from
/// `x_init` to zero, which makes it a gating signal that stays near one for
/// most of the movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmoidSystem {
    tau: f64,
    x_init: f64,
    max_rate: f64,
    inflection_ratio: f64,
}

impl SigmoidSystem {
    pub fn new(tau: f64, x_init: f64, max_rate: f64, inflection_ratio: f64) -> Self {
        Self {
            tau,
            x_init,
            max_rate,
            inflection_ratio,
        }
    }

    /// Carrying capacity for the current time constant.
    pub fn capacity(&self) -> f64 {
        self.x_init * (1.0 + (self.max_rate * self.inflection_ratio * self.tau).exp())
    }

    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }

    pub fn inflection_ratio(&self) -> f64 {
        self.inflection_ratio
    }
}

impl DynamicalSystem for SigmoidSystem {
    fn dim(&self) -> usize {
        1
    }

    fn tau(&self) -> f64 {
        self.tau
    }

    fn set_tau(&mut self, tau: f64) {
        self.tau = tau;
    }

    fn x_init(&self) -> DVector<f64> {
        DVector::from_element(1, self.x_init)
    }

    fn differential_equation(&self, x: &DVector<f64>) -> DVector<f64> {
        let k = self.capacity();
        if k == 0.0 {
            return DVector::zeros(1);
        }
        DVector::from_element(1, self.max_rate * x[0] * (1.0 - x[0] / k))
    }

    fn analytical_state(&self, t: f64) -> (DVector<f64>, DVector<f64>) {
        if self.x_init == 0.0 {
            return (DVector::zeros(1), DVector::zeros(1));
        }
        let k = self.capacity();
        let b = k / self.x_init - 1.0;
        let e = (-self.max_rate * t).exp();
        let x = k / (1.0 + b * e);
        let xd = self.max_rate * x * (1.0 - x / k);
        (DVector::from_element(1, x), DVector::from_element(1, xd))
    }
}
