use serde::{Deserialize, Serialize};

/// Default damping; with `k = d^2/4` the system is critically damped.
pub const DEFAULT_DAMPING: f64 = 20.0;

/// Second-order attractor `tau zd = -k (y - g) - d z + f`, `tau yd = z`.
///
/// Evaluated per dimension; the movement primitive owns the state layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpringDamperSystem {
    tau: f64,
    damping_coefficient: f64,
    spring_constant: f64,
    mass: f64,
}

impl SpringDamperSystem {
    pub fn new(tau: f64, damping_coefficient: f64, spring_constant: f64, mass: f64) -> Self {
        Self {
            tau,
            damping_coefficient,
            spring_constant,
            mass,
        }
    }

    /// Critically damped system with unit mass.
    pub fn critically_damped(tau: f64, damping_coefficient: f64) -> Self {
        Self::new(
            tau,
            damping_coefficient,
            damping_coefficient * damping_coefficient / 4.0,
            1.0,
        )
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn set_tau(&mut self, tau: f64) {
        self.tau = tau;
    }

    pub fn damping_coefficient(&self) -> f64 {
        self.damping_coefficient
    }

    pub fn spring_constant(&self) -> f64 {
        self.spring_constant
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// `(yd, zd)` for position `y`, scaled velocity `z = tau yd`, attractor
    /// `y_goal` and external force `forcing`.
    pub fn derivatives(&self, y: f64, z: f64, y_goal: f64, forcing: f64) -> (f64, f64) {
        let yd = z / self.tau;
        let zd = (-self.spring_constant * (y - y_goal) - self.damping_coefficient * z + forcing)
            / (self.mass * self.tau);
        (yd, zd)
    }

    /// Force the system would need to produce acceleration `ydd` at the given
    /// kinematic state. Inverse of [`SpringDamperSystem::derivatives`].
    pub fn required_force(&self, y: f64, yd: f64, ydd: f64, y_goal: f64) -> f64 {
        self.mass * self.tau * self.tau * ydd
            + self.spring_constant * (y - y_goal)
            + self.damping_coefficient * self.tau * yd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_critical_damping() {
        let system = SpringDamperSystem::critically_damped(1.0, 20.0);
        assert_relative_eq!(system.spring_constant(), 100.0);
        assert_relative_eq!(system.mass(), 1.0);
    }

    #[test]
    fn test_required_force_inverts_derivatives() {
        let system = SpringDamperSystem::critically_damped(0.8, 20.0);
        let (y, yd, goal, force) = (0.3, 0.7, 1.0, 12.5);
        let z = yd * system.tau();
        let (yd_out, zd) = system.derivatives(y, z, goal, force);
        assert_relative_eq!(yd_out, yd, epsilon = 1e-12);

        let ydd = zd / system.tau();
        assert_relative_eq!(system.required_force(y, yd, ydd, goal), force, epsilon = 1e-9);
    }

    #[test]
    fn test_rest_at_goal() {
        let system = SpringDamperSystem::critically_damped(1.0, 20.0);
        assert_eq!(system.derivatives(2.0, 0.0, 2.0, 0.0), (0.0, 0.0));
    }
}
