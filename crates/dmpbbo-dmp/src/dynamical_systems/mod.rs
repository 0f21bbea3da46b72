//! Elementary dynamical systems composing a movement primitive.
//!
//! Each system has a closed-form solution and a differential equation that
//! agree with each other; the DMP integrates the latter step-wise and uses the
//! former for its analytical solution.

pub mod exponential;
pub mod sigmoid;
pub mod spring_damper;
pub mod time;

pub use exponential::ExponentialSystem;
pub use sigmoid::SigmoidSystem;
pub use spring_damper::SpringDamperSystem;
pub use time::TimeSystem;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Autonomous first-order system `xd = f(x)` with time constant `tau`.
pub trait DynamicalSystem {
    fn dim(&self) -> usize;

    fn tau(&self) -> f64;

    fn set_tau(&mut self, tau: f64);

    fn x_init(&self) -> DVector<f64>;

    fn differential_equation(&self, x: &DVector<f64>) -> DVector<f64>;

    /// State and rate of change at time `t`, in closed form.
    fn analytical_state(&self, t: f64) -> (DVector<f64>, DVector<f64>);

    /// Maps a numerically integrated state back onto the values the system
    /// can actually take.
    fn constrain(&self, x: DVector<f64>) -> DVector<f64> {
        x
    }
}

/// Serializable choice of phase or gating system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemKind {
    Exponential(ExponentialSystem),
    Sigmoid(SigmoidSystem),
    Time(TimeSystem),
}

impl SystemKind {
    fn inner(&self) -> &dyn DynamicalSystem {
        match self {
            SystemKind::Exponential(s) => s,
            SystemKind::Sigmoid(s) => s,
            SystemKind::Time(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn DynamicalSystem {
        match self {
            SystemKind::Exponential(s) => s,
            SystemKind::Sigmoid(s) => s,
            SystemKind::Time(s) => s,
        }
    }

    /// Closed-form value of a one-dimensional system at `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        self.analytical_state(t).0[0]
    }

    /// [`DynamicalSystem::constrain`] for a one-dimensional system.
    pub fn constrain_value(&self, x: f64) -> f64 {
        self.constrain(DVector::from_element(1, x))[0]
    }

    /// Rate of change of a one-dimensional system in state `x`.
    pub fn rate(&self, x: f64) -> f64 {
        self.differential_equation(&DVector::from_element(1, x))[0]
    }
}

impl DynamicalSystem for SystemKind {
    fn dim(&self) -> usize {
        self.inner().dim()
    }

    fn tau(&self) -> f64 {
        self.inner().tau()
    }

    fn set_tau(&mut self, tau: f64) {
        self.inner_mut().set_tau(tau)
    }

    fn x_init(&self) -> DVector<f64> {
        self.inner().x_init()
    }

    fn differential_equation(&self, x: &DVector<f64>) -> DVector<f64> {
        self.inner().differential_equation(x)
    }

    fn analytical_state(&self, t: f64) -> (DVector<f64>, DVector<f64>) {
        self.inner().analytical_state(t)
    }

    fn constrain(&self, x: DVector<f64>) -> DVector<f64> {
        self.inner().constrain(x)
    }
}
