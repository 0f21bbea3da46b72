use super::DynamicalSystem;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Exponential decay towards an attractor: `xd = alpha (x_attr - x) / tau`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialSystem {
    tau: f64,
    x_init: DVector<f64>,
    x_attr: DVector<f64>,
    alpha: f64,
}

impl ExponentialSystem {
    pub fn new(tau: f64, x_init: DVector<f64>, x_attr: DVector<f64>, alpha: f64) -> Self {
        debug_assert_eq!(x_init.len(), x_attr.len());
        Self {
            tau,
            x_init,
            x_attr,
            alpha,
        }
    }

    /// Scalar system decaying from `x_init` to `x_attr`.
    pub fn scalar(tau: f64, x_init: f64, x_attr: f64, alpha: f64) -> Self {
        Self::new(
            tau,
            DVector::from_element(1, x_init),
            DVector::from_element(1, x_attr),
            alpha,
        )
    }

    pub fn x_attr(&self) -> &DVector<f64> {
        &self.x_attr
    }

    pub fn set_x_attr(&mut self, x_attr: DVector<f64>) {
        self.x_attr = x_attr;
    }

    pub fn set_x_init(&mut self, x_init: DVector<f64>) {
        self.x_init = x_init;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl DynamicalSystem for ExponentialSystem {
    fn dim(&self) -> usize {
        self.x_init.len()
    }

    fn tau(&self) -> f64 {
        self.tau
    }

    fn set_tau(&mut self, tau: f64) {
        self.tau = tau;
    }

    fn x_init(&self) -> DVector<f64> {
        self.x_init.clone()
    }

    fn differential_equation(&self, x: &DVector<f64>) -> DVector<f64> {
        (&self.x_attr - x) * (self.alpha / self.tau)
    }

    fn analytical_state(&self, t: f64) -> (DVector<f64>, DVector<f64>) {
        let decay = (-self.alpha * t / self.tau).exp();
        let offset = &self.x_init - &self.x_attr;
        let x = &self.x_attr + &offset * decay;
        let xd = offset * (-self.alpha / self.tau * decay);
        (x, xd)
    }
}
