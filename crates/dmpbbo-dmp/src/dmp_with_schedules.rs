//! Movement primitive that additionally outputs schedules.
//!
//! A schedule is an auxiliary time-varying profile (e.g. controller gains)
//! that is predicted from the phase variable only, so it stays synchronized
//! with the movement but is never influenced by the state of the plant.

use crate::dmp::{AnalyticalSolution, Dmp};
use crate::function_approximators::Rbfn;
use dmpbbo_core::{DmpBboError, FunctionApproximator, Parameterizable, Result, Trajectory};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "F: Serialize", deserialize = "F: DeserializeOwned"))]
pub struct DmpWithSchedules<F = Rbfn> {
    dmp: Dmp<F>,
    schedule_approximators: Vec<F>,
    #[serde(default)]
    min_schedules: Option<f64>,
    #[serde(default)]
    max_schedules: Option<f64>,
    /// Append the schedule parameters to the parameter vector.
    #[serde(default)]
    optimize_schedules: bool,
}

impl<F: FunctionApproximator> DmpWithSchedules<F> {
    /// One approximator per schedule dimension, each with a scalar input.
    pub fn new(dmp: Dmp<F>, schedule_approximators: Vec<F>) -> Result<Self> {
        if let Some(fa) = schedule_approximators.iter().find(|fa| fa.dim_input() != 1) {
            return Err(DmpBboError::dimension_mismatch(
                "schedule approximator inputs",
                1,
                fa.dim_input(),
            ));
        }
        Ok(Self {
            dmp,
            schedule_approximators,
            min_schedules: None,
            max_schedules: None,
            optimize_schedules: false,
        })
    }

    /// Clamps predicted schedules to `[min, max]` (either bound optional).
    pub fn with_schedule_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_schedules = min;
        self.max_schedules = max;
        self
    }

    pub fn with_schedule_optimization(mut self, optimize: bool) -> Self {
        self.optimize_schedules = optimize;
        self
    }

    pub fn dmp(&self) -> &Dmp<F> {
        &self.dmp
    }

    pub fn dmp_mut(&mut self) -> &mut Dmp<F> {
        &mut self.dmp
    }

    pub fn dim_schedules(&self) -> usize {
        self.schedule_approximators.len()
    }

    pub fn schedule_approximators(&self) -> &[F] {
        &self.schedule_approximators
    }

    /// Trains the movement and the schedules.
    ///
    /// Schedule targets are `schedules` if given, else the trajectory's
    /// auxiliary columns.
    pub fn train_sched(&mut self, trajectory: &Trajectory, schedules: Option<&DMatrix<f64>>) -> Result<()> {
        let targets = schedules.or_else(|| trajectory.misc()).ok_or_else(|| {
            DmpBboError::config("no schedules given and the trajectory carries no auxiliary columns")
        })?;
        if targets.ncols() != self.dim_schedules() {
            return Err(DmpBboError::dimension_mismatch(
                "schedule columns",
                self.dim_schedules(),
                targets.ncols(),
            ));
        }
        if targets.nrows() != trajectory.len() {
            return Err(DmpBboError::dimension_mismatch(
                "schedule rows",
                trajectory.len(),
                targets.nrows(),
            ));
        }
        let targets = targets.clone();

        self.dmp.train(trajectory)?;

        let phases = DMatrix::from_fn(trajectory.len(), 1, |i, _| self.dmp.phase_at(trajectory.ts()[i]));
        for (d, fa) in self.schedule_approximators.iter_mut().enumerate() {
            fa.train(&phases, &targets.column(d).into_owned())?;
        }
        debug!(
            "Trained {} schedule(s) alongside {}-D DMP",
            self.dim_schedules(),
            self.dmp.dim()
        );
        Ok(())
    }

    /// Schedules for one phase value, clamped to the configured bounds.
    pub fn predict_schedules(&self, phase: f64) -> Result<DVector<f64>> {
        let mut schedules = DVector::zeros(self.dim_schedules());
        for (d, fa) in self.schedule_approximators.iter().enumerate() {
            let mut value = fa.predict_scalar(phase)?;
            if let Some(min) = self.min_schedules {
                value = value.max(min);
            }
            if let Some(max) = self.max_schedules {
                value = value.min(max);
            }
            schedules[d] = value;
        }
        Ok(schedules)
    }

    /// Analytical solution plus `T x S` schedules.
    pub fn analytical_solution_sched(&self, ts: &DVector<f64>) -> Result<(AnalyticalSolution, DMatrix<f64>)> {
        let solution = self.dmp.analytical_solution(ts)?;
        let schedules = self.schedules_from_states(&solution.xs)?;
        Ok((solution, schedules))
    }

    pub fn integrate_start_sched(
        &mut self,
        y_init: Option<&DVector<f64>>,
    ) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>)> {
        let (x, xd) = self.dmp.integrate_start(y_init)?;
        let schedules = self.predict_schedules(x[self.dmp.layout().phase()])?;
        Ok((x, xd, schedules))
    }

    pub fn integrate_step_sched(
        &self,
        dt: f64,
        x: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>)> {
        let (x_new, xd_new) = self.dmp.integrate_step(dt, x)?;
        let schedules = self.predict_schedules(x_new[self.dmp.layout().phase()])?;
        Ok((x_new, xd_new, schedules))
    }

    /// Trajectory whose auxiliary columns hold the schedules.
    pub fn states_as_trajectory_sched(
        &self,
        ts: &DVector<f64>,
        xs: &DMatrix<f64>,
        xds: &DMatrix<f64>,
        schedules: &DMatrix<f64>,
    ) -> Result<Trajectory> {
        if schedules.ncols() != self.dim_schedules() {
            return Err(DmpBboError::dimension_mismatch(
                "schedule columns",
                self.dim_schedules(),
                schedules.ncols(),
            ));
        }
        let mut trajectory = self.dmp.states_as_trajectory(ts, xs, xds)?;
        trajectory.set_misc(Some(schedules.clone()))?;
        Ok(trajectory)
    }

    pub fn set_selected_param_names(&mut self, names: &[&str]) -> Result<()> {
        self.dmp.set_selected_param_names(names)?;
        for fa in &mut self.schedule_approximators {
            fa.set_selected_param_names(names)?;
        }
        Ok(())
    }

    fn schedules_from_states(&self, xs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let phase = self.dmp.layout().phase();
        let mut schedules = DMatrix::zeros(xs.nrows(), self.dim_schedules());
        for i in 0..xs.nrows() {
            schedules.set_row(i, &self.predict_schedules(xs[(i, phase)])?.transpose());
        }
        Ok(schedules)
    }

    fn schedule_param_size(&self) -> usize {
        if self.optimize_schedules {
            self.schedule_approximators.iter().map(|fa| fa.param_vector_size()).sum()
        } else {
            0
        }
    }
}

impl<F: FunctionApproximator> Parameterizable for DmpWithSchedules<F> {
    fn param_vector(&self) -> Result<DVector<f64>> {
        let mut values = self.dmp.param_vector()?.as_slice().to_vec();
        if self.optimize_schedules {
            for fa in &self.schedule_approximators {
                values.extend_from_slice(fa.param_vector()?.as_slice());
            }
        }
        Ok(DVector::from_vec(values))
    }

    fn set_param_vector(&mut self, values: &DVector<f64>) -> Result<()> {
        let expected = self.param_vector_size();
        if values.len() != expected {
            return Err(DmpBboError::dimension_mismatch(
                "DMP-with-schedules parameter vector",
                expected,
                values.len(),
            ));
        }
        let dmp_size = self.dmp.param_vector_size();
        self.dmp.set_param_vector(&values.rows(0, dmp_size).into_owned())?;
        if self.optimize_schedules {
            let mut offset = dmp_size;
            for fa in &mut self.schedule_approximators {
                let size = fa.param_vector_size();
                fa.set_param_vector(&values.rows(offset, size).into_owned())?;
                offset += size;
            }
        }
        Ok(())
    }

    fn param_vector_size(&self) -> usize {
        self.dmp.param_vector_size() + self.schedule_param_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmp::DmpConfig;
    use approx::assert_relative_eq;

    fn demonstration() -> (Trajectory, DMatrix<f64>) {
        let n = 51;
        let ts = DVector::from_fn(n, |i, _| i as f64 / (n - 1) as f64);
        let traj = Trajectory::from_min_jerk(&ts, &DVector::zeros(1), &DVector::from_element(1, 1.0)).unwrap();
        // Gain profile rising linearly with time.
        let schedules = DMatrix::from_fn(n, 1, |i, _| 100.0 + 400.0 * ts[i]);
        (traj, schedules)
    }

    fn untrained() -> DmpWithSchedules {
        let dmp = Dmp::new(
            1.0,
            DVector::zeros(1),
            DVector::from_element(1, 1.0),
            vec![Rbfn::new(10, 0.7)],
            DmpConfig::default(),
        )
        .unwrap();
        DmpWithSchedules::new(dmp, vec![Rbfn::new(10, 0.7)]).unwrap()
    }

    #[test]
    fn test_train_with_explicit_schedules() {
        let (traj, schedules) = demonstration();
        let mut dmp = untrained();
        dmp.train_sched(&traj, Some(&schedules)).unwrap();

        let ts = traj.ts().clone();
        let (_, predicted) = dmp.analytical_solution_sched(&ts).unwrap();
        // Kernels without a bias term sag towards the ends of a linear profile.
        let err = (predicted - &schedules).amax();
        assert!(err < 0.1 * 500.0, "schedule reproduction error {}", err);
        assert_relative_eq!(dmp.predict_schedules(0.5).unwrap()[0], 300.0, epsilon = 1.0);
    }

    #[test]
    fn test_train_falls_back_to_misc() {
        let (mut traj, schedules) = demonstration();
        traj.set_misc(Some(schedules.clone())).unwrap();
        let mut dmp = untrained();
        dmp.train_sched(&traj, None).unwrap();
        assert_relative_eq!(dmp.predict_schedules(0.5).unwrap()[0], 300.0, epsilon = 1.0);
    }

    #[test]
    fn test_missing_or_malformed_targets() {
        let (traj, _) = demonstration();
        let mut dmp = untrained();
        assert!(matches!(
            dmp.train_sched(&traj, None),
            Err(DmpBboError::ConfigurationError(_))
        ));

        let two_columns = DMatrix::zeros(traj.len(), 2);
        assert!(matches!(
            dmp.train_sched(&traj, Some(&two_columns)),
            Err(DmpBboError::DimensionMismatch { expected: 1, actual: 2, .. })
        ));

        let short = DMatrix::zeros(traj.len() - 1, 1);
        assert!(matches!(
            dmp.train_sched(&traj, Some(&short)),
            Err(DmpBboError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_schedule_bounds() {
        let (traj, schedules) = demonstration();
        let mut dmp = untrained().with_schedule_bounds(Some(150.0), Some(400.0));
        dmp.train_sched(&traj, Some(&schedules)).unwrap();
        assert_eq!(dmp.predict_schedules(0.0).unwrap()[0], 150.0);
        assert_eq!(dmp.predict_schedules(1.0).unwrap()[0], 400.0);
    }

    #[test]
    fn test_step_schedules_follow_phase() {
        let (traj, schedules) = demonstration();
        let mut dmp = untrained();
        dmp.train_sched(&traj, Some(&schedules)).unwrap();

        let (x0, _, s0) = dmp.integrate_start_sched(None).unwrap();
        let (x1, _, s1) = dmp.integrate_step_sched(0.1, &x0).unwrap();
        let phase = dmp.dmp().layout().phase();
        assert_eq!(s0, dmp.predict_schedules(x0[phase]).unwrap());
        assert_eq!(s1, dmp.predict_schedules(x1[phase]).unwrap());

        // Perturbing the position leaves the schedules untouched.
        let mut perturbed = x0.clone();
        perturbed[0] += 0.5;
        let (_, _, s_perturbed) = dmp.integrate_step_sched(0.1, &perturbed).unwrap();
        assert_eq!(s_perturbed, s1);
    }

    #[test]
    fn test_param_vector_optionally_includes_schedules() {
        let (traj, schedules) = demonstration();
        let mut dmp = untrained();
        dmp.train_sched(&traj, Some(&schedules)).unwrap();
        assert_eq!(dmp.param_vector_size(), 10);

        let mut dmp = dmp.with_schedule_optimization(true);
        assert_eq!(dmp.param_vector_size(), 20);
        let values = dmp.param_vector().unwrap();
        dmp.set_param_vector(&values).unwrap();
        assert_eq!(dmp.param_vector().unwrap(), values);

        let mut shifted = values.clone();
        shifted[15] += 1.0;
        dmp.set_param_vector(&shifted).unwrap();
        assert_eq!(dmp.param_vector().unwrap()[15], values[15] + 1.0);
        assert!(dmp.set_param_vector(&DVector::zeros(10)).is_err());
    }

    #[test]
    fn test_trajectory_carries_schedules() {
        let (traj, schedules) = demonstration();
        let mut dmp = untrained();
        dmp.train_sched(&traj, Some(&schedules)).unwrap();
        let ts = traj.ts().clone();
        let (sol, sched) = dmp.analytical_solution_sched(&ts).unwrap();
        let out = dmp.states_as_trajectory_sched(&ts, &sol.xs, &sol.xds, &sched).unwrap();
        assert_eq!(out.dim_misc(), 1);
        assert_eq!(out.misc().unwrap(), &sched);
    }
}
