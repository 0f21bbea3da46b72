use super::DynamicalSystem;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Linear phase that reaches its end value at `t = tau` and then stays put.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSystem {
    tau: f64,
    count_down: bool,
}

impl TimeSystem {
    pub fn new(tau: f64, count_down: bool) -> Self {
        Self { tau, count_down }
    }

    pub fn count_down(&self) -> bool {
        self.count_down
    }
}

impl DynamicalSystem for TimeSystem {
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
        DVector::from_element(1, if self.count_down { 1.0 } else { 0.0 })
    }

    fn differential_equation(&self, x: &DVector<f64>) -> DVector<f64> {
        let xd = if self.count_down {
            if x[0] > 0.0 {
                -1.0 / self.tau
            } else {
                0.0
            }
        } else if x[0] < 1.0 {
            1.0 / self.tau
        } else {
            0.0
        };
        DVector::from_element(1, xd)
    }

    fn analytical_state(&self, t: f64) -> (DVector<f64>, DVector<f64>) {
        let progress = (t / self.tau).clamp(0.0, 1.0);
        let running = t < self.tau;
        let (x, xd) = match (self.count_down, running) {
            (false, true) => (progress, 1.0 / self.tau),
            (false, false) => (1.0, 0.0),
            (true, true) => (1.0 - progress, -1.0 / self.tau),
            (true, false) => (0.0, 0.0),
        };
        (DVector::from_element(1, x), DVector::from_element(1, xd))
    }

    // A step can overshoot the end value; clamp it.
    fn constrain(&self, x: DVector<f64>) -> DVector<f64> {
        x.map(|v| v.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::euler_vs_analytical;
    use super::*;

    #[test]
    fn test_counts_up_and_saturates() {
        let system = TimeSystem::new(2.0, false);
        assert_eq!(system.analytical_state(0.0).0[0], 0.0);
        assert_eq!(system.analytical_state(1.0).0[0], 0.5);
        assert_eq!(system.analytical_state(1.0).1[0], 0.5);
        assert_eq!(system.analytical_state(3.0).0[0], 1.0);
        assert_eq!(system.analytical_state(3.0).1[0], 0.0);
    }

    #[test]
    fn test_counts_down() {
        let system = TimeSystem::new(1.0, true);
        assert_eq!(system.x_init()[0], 1.0);
        assert_eq!(system.analytical_state(0.25).0[0], 0.75);
        assert_eq!(system.analytical_state(2.0).0[0], 0.0);
    }

    #[test]
    fn test_euler_stays_in_unit_interval() {
        let system = TimeSystem::new(1.0, false);
        let error = euler_vs_analytical(&system, 1.5, 7);
        assert!(error < 1e-9, "linear phase should integrate exactly, got {}", error);
    }

    #[test]
    fn test_constrain_clamps_to_unit_interval() {
        let system = TimeSystem::new(1.0, false);
        let x = system.constrain(DVector::from_vec(vec![1.3]));
        assert_eq!(x[0], 1.0);
        let x = system.constrain(DVector::from_vec(vec![-0.2]));
        assert_eq!(x[0], 0.0);
    }
}
