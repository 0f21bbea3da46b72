//! Task solvers that turn a parameter sample into a DMP rollout.

use dmpbbo_core::{DmpBboError, Parameterizable, Result, TaskSolver};
use dmpbbo_dmp::{Dmp, DmpWithSchedules};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::ops::Range;

fn default_beyond_tau_factor() -> f64 {
    1.2
}

fn time_grid(duration: f64, n_time_steps: usize) -> DVector<f64> {
    DVector::from_fn(n_time_steps, |i, _| duration * i as f64 / (n_time_steps - 1) as f64)
}

fn check_rollout_settings(integrate_time_factor: f64, n_time_steps: usize) -> Result<()> {
    if !(integrate_time_factor > 0.0) {
        return Err(DmpBboError::config(format!(
            "integration time factor must be positive, got {}",
            integrate_time_factor
        )));
    }
    if n_time_steps < 2 {
        return Err(DmpBboError::config(format!(
            "a rollout needs at least two time steps, got {}",
            n_time_steps
        )));
    }
    Ok(())
}

/// Integrates the sampled DMP and returns its trajectory.
///
/// Cost variables are [`dmpbbo_core::Trajectory::as_matrix`]: `t | y | yd | ydd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSolverDmp {
    dmp: Dmp,
    dt: f64,
    /// Rollouts last `tau * integrate_dmp_beyond_tau_factor`.
    #[serde(default = "default_beyond_tau_factor")]
    integrate_dmp_beyond_tau_factor: f64,
    #[serde(default)]
    use_analytical_solution: bool,
}

impl TaskSolverDmp {
    pub fn new(dmp: Dmp, dt: f64, integrate_dmp_beyond_tau_factor: f64) -> Result<Self> {
        let solver = Self {
            dmp,
            dt,
            integrate_dmp_beyond_tau_factor,
            use_analytical_solution: false,
        };
        solver.validate()?;
        Ok(solver)
    }

    /// Checks the rollout settings, also for solvers read back from a session.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) {
            return Err(DmpBboError::config(format!("integration step must be positive, got {}", self.dt)));
        }
        check_rollout_settings(self.integrate_dmp_beyond_tau_factor, 2)?;
        let integrate_time = self.integrate_time();
        if !(integrate_time > 0.0 && integrate_time.is_finite()) {
            return Err(DmpBboError::config(format!(
                "integration time must be positive and finite, got {}",
                integrate_time
            )));
        }
        Ok(())
    }

    /// Use the closed-form solution instead of step-wise integration.
    pub fn with_analytical_solution(mut self, analytical: bool) -> Self {
        self.use_analytical_solution = analytical;
        self
    }

    pub fn dmp(&self) -> &Dmp {
        &self.dmp
    }

    pub fn integrate_time(&self) -> f64 {
        self.dmp.tau() * self.integrate_dmp_beyond_tau_factor
    }

    fn n_time_steps(&self) -> usize {
        ((self.integrate_time() / self.dt).round() as usize + 1).max(2)
    }
}

impl TaskSolver for TaskSolverDmp {
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.validate()?;
        let mut dmp = self.dmp.clone();
        dmp.set_param_vector(sample)?;

        let ts = time_grid(self.integrate_time(), self.n_time_steps());
        let (xs, xds) = if self.use_analytical_solution {
            let solution = dmp.analytical_solution(&ts)?;
            (solution.xs, solution.xds)
        } else {
            dmp.integrate_steps(&ts)?
        };
        Ok(dmp.states_as_trajectory(&ts, &xs, &xds)?.as_matrix())
    }
}

/// Column ranges of the cost variables produced by [`TaskSolverDmpForceField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceFieldColumns {
    dim: usize,
}

impl ForceFieldColumns {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Total number of columns, `1 + 7 D + 1`.
    pub fn n_columns(&self) -> usize {
        2 + 7 * self.dim
    }

    pub fn t(&self) -> usize {
        0
    }

    pub fn y_des(&self) -> Range<usize> {
        self.block(0)
    }

    pub fn yd_des(&self) -> Range<usize> {
        self.block(1)
    }

    pub fn ydd_des(&self) -> Range<usize> {
        self.block(2)
    }

    pub fn y_cur(&self) -> Range<usize> {
        self.block(3)
    }

    pub fn yd_cur(&self) -> Range<usize> {
        self.block(4)
    }

    pub fn ydd_cur(&self) -> Range<usize> {
        self.block(5)
    }

    pub fn schedules(&self) -> Range<usize> {
        self.block(6)
    }

    pub fn field(&self) -> usize {
        1 + 7 * self.dim
    }

    fn block(&self, i: usize) -> Range<usize> {
        let start = 1 + i * self.dim;
        start..start + self.dim
    }
}

/// Rollout of a DMP with schedules tracked by a PD controller under a
/// force-field perturbation.
///
/// The schedules are the controller gains; damping is `sqrt(gain)`. The field
/// is a Gaussian pulse in time of height `field_strength`, centered at
/// `field_max_time_ratio * tau`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSolverDmpForceField {
    dmp: DmpWithSchedules,
    n_time_steps: usize,
    #[serde(default = "default_beyond_tau_factor")]
    integrate_dmp_beyond_tau_factor: f64,
    field_strength: f64,
    #[serde(default = "default_field_max_time_ratio")]
    field_max_time_ratio: f64,
}

fn default_field_max_time_ratio() -> f64 {
    0.5
}

impl TaskSolverDmpForceField {
    pub fn new(
        dmp: DmpWithSchedules,
        n_time_steps: usize,
        integrate_dmp_beyond_tau_factor: f64,
        field_strength: f64,
    ) -> Result<Self> {
        let solver = Self {
            dmp,
            n_time_steps,
            integrate_dmp_beyond_tau_factor,
            field_strength,
            field_max_time_ratio: default_field_max_time_ratio(),
        };
        solver.validate()?;
        Ok(solver)
    }

    /// Checks the rollout settings, also for solvers read back from a session.
    pub fn validate(&self) -> Result<()> {
        check_rollout_settings(self.integrate_dmp_beyond_tau_factor, self.n_time_steps)?;
        if self.dmp.dim_schedules() != self.dmp.dmp().dim() {
            return Err(DmpBboError::dimension_mismatch(
                "gain schedules per DMP dimension",
                self.dmp.dmp().dim(),
                self.dmp.dim_schedules(),
            ));
        }
        Ok(())
    }

    pub fn with_field_strength(mut self, field_strength: f64) -> Self {
        self.field_strength = field_strength;
        self
    }

    pub fn columns(&self) -> ForceFieldColumns {
        ForceFieldColumns::new(self.dmp.dmp().dim())
    }

    fn field_at(&self, t: f64) -> f64 {
        let max_time = self.field_max_time_ratio * self.dmp.dmp().tau();
        let width_sq = 0.05 * max_time;
        self.field_strength * (-0.5 * (t - max_time).powi(2) / width_sq).exp()
    }
}

impl TaskSolver for TaskSolverDmpForceField {
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.validate()?;
        let mut dmp = self.dmp.clone();
        dmp.set_param_vector(sample)?;

        let dim = dmp.dmp().dim();
        let cols = self.columns();
        let ts = time_grid(dmp.dmp().tau() * self.integrate_dmp_beyond_tau_factor, self.n_time_steps);
        let dt = ts[1] - ts[0];
        let mut out = DMatrix::zeros(ts.len(), cols.n_columns());

        let (mut x_des, xd_des, schedules) = dmp.integrate_start_sched(None)?;
        let (y, yd, ydd) = dmp.dmp().states_as_pos_vel_acc(&x_des, &xd_des)?;
        let mut y_cur = y.clone();
        let mut yd_cur = yd.clone();
        let mut ydd_cur = ydd.clone();
        let blocks = [&y, &yd, &ydd, &y_cur, &yd_cur, &ydd_cur, &schedules];
        write_row(&mut out, 0, &cols, ts[0], blocks, self.field_at(ts[0]));

        for i in 1..ts.len() {
            let (x_new, xd_new, schedules) = dmp.integrate_step_sched(dt, &x_des)?;
            x_des = x_new;
            let (y, yd, ydd) = dmp.dmp().states_as_pos_vel_acc(&x_des, &xd_new)?;

            let field = self.field_at(ts[i]);
            for d in 0..dim {
                let gain = schedules[d].max(0.0);
                let y_err = y_cur[d] - y[d];
                let yd_err = yd_cur[d] - yd[d];
                ydd_cur[d] = -gain * y_err - gain.sqrt() * yd_err + field;
            }
            yd_cur += &ydd_cur * dt;
            y_cur += &yd_cur * dt;

            let blocks = [&y, &yd, &ydd, &y_cur, &yd_cur, &ydd_cur, &schedules];
            write_row(&mut out, i, &cols, ts[i], blocks, field);
        }
        Ok(out)
    }
}

fn write_row(
    out: &mut DMatrix<f64>,
    i: usize,
    cols: &ForceFieldColumns,
    t: f64,
    blocks: [&DVector<f64>; 7],
    field: f64,
) {
    out[(i, cols.t())] = t;
    let ranges = [
        cols.y_des(),
        cols.yd_des(),
        cols.ydd_des(),
        cols.y_cur(),
        cols.yd_cur(),
        cols.ydd_cur(),
        cols.schedules(),
    ];
    for (range, block) in ranges.into_iter().zip(blocks) {
        for (j, c) in range.enumerate() {
            out[(i, c)] = block[j];
        }
    }
    out[(i, cols.field())] = field;
}
