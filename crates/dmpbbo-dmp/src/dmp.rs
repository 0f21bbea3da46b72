//! Dynamical movement primitive.
//!
//! A critically damped spring-damper system pulled towards a moving goal and
//! perturbed by a learned forcing term. The forcing term is a product of a
//! gating signal and one function approximator per dimension, each queried
//! with the phase variable:
//!
//! ```text
//! tau * yd = z
//! tau * zd = -k (y - g) - d z + gating * fa(phase) * s
//! ```

use crate::dynamical_systems::{
    DynamicalSystem, ExponentialSystem, SigmoidSystem, SpringDamperSystem, SystemKind, TimeSystem,
};
use crate::function_approximators::Rbfn;
use crate::state::{DmpState, DmpStateLayout};
use dmpbbo_core::{check_time_vector, DmpBboError, FunctionApproximator, Parameterizable, Result, Trajectory};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Sub-steps of the classical Runge-Kutta scheme per output interval of the
/// analytical solution.
const ANALYTICAL_SUBSTEPS: usize = 4;

const SIGMOID_MAX_RATE: f64 = -10.0;
const SIGMOID_INFLECTION_RATIO: f64 = 0.9;
const IJSPEERT_ALPHA: f64 = 4.0;

/// Choice of goal, phase and gating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmpType {
    /// Exponential goal, linear phase counting up, sigmoid gating.
    #[default]
    Kulvicius2012Joining,
    /// Exponential goal, linear phase counting down, sigmoid gating.
    Countdown2013,
    /// Static goal, exponentially decaying phase and gating.
    Ijspeert2002Movement,
}

/// How the forcing term adapts when start or goal differ from the demonstration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcingTermScaling {
    #[default]
    NoScaling,
    /// Scale by `(y_attr - y_init) / (y_attr - y_init)_trained` per dimension.
    GoalMinusStart,
}

/// Scheme used by [`Dmp::integrate_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    #[default]
    Euler,
    RungeKutta,
}

/// Formulation parameters of a [`Dmp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmpConfig {
    #[serde(default)]
    pub dmp_type: DmpType,

    #[serde(default)]
    pub scaling: ForcingTermScaling,

    #[serde(default)]
    pub integration: IntegrationMethod,

    /// Damping of the spring-damper; the spring constant is `d^2 / 4`.
    #[serde(default = "default_damping_coefficient")]
    pub damping_coefficient: f64,

    /// Decay constant of the exponential goal system.
    #[serde(default = "default_goal_alpha")]
    pub goal_alpha: f64,
}

fn default_damping_coefficient() -> f64 {
    crate::dynamical_systems::spring_damper::DEFAULT_DAMPING
}

fn default_goal_alpha() -> f64 {
    15.0
}

impl Default for DmpConfig {
    fn default() -> Self {
        Self {
            dmp_type: DmpType::default(),
            scaling: ForcingTermScaling::default(),
            integration: IntegrationMethod::default(),
            damping_coefficient: default_damping_coefficient(),
            goal_alpha: default_goal_alpha(),
        }
    }
}

impl DmpConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.damping_coefficient > 0.0) {
            return Err(DmpBboError::config(format!(
                "damping coefficient must be positive, got {}",
                self.damping_coefficient
            )));
        }
        if !(self.goal_alpha > 0.0) {
            return Err(DmpBboError::config(format!(
                "goal alpha must be positive, got {}",
                self.goal_alpha
            )));
        }
        Ok(())
    }
}

/// States and rates of change over a time vector, plus the forcing terms
/// that produced them. All matrices have one row per time step.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticalSolution {
    /// `T x (3D + 2)`
    pub xs: DMatrix<f64>,
    /// `T x (3D + 2)`
    pub xds: DMatrix<f64>,
    /// `T x D`, `gating * fa(phase) * s`
    pub forcing_terms: DMatrix<f64>,
    /// `T x D`, raw approximator outputs
    pub fa_outputs: DMatrix<f64>,
}

/// Goal, phase and gating in closed form at one time instant.
struct Inputs {
    goal: DVector<f64>,
    goal_d: DVector<f64>,
    phase: f64,
    phase_d: f64,
    gating: f64,
    gating_d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "F: Serialize", deserialize = "F: DeserializeOwned"))]
pub struct Dmp<F = Rbfn> {
    config: DmpConfig,
    tau: f64,
    y_init: DVector<f64>,
    y_attr: DVector<f64>,
    /// `y_attr - y_init` of the demonstration, once trained.
    trained_amplitude: Option<DVector<f64>>,
    spring: SpringDamperSystem,
    /// Absent for formulations with a static goal.
    goal_system: Option<ExponentialSystem>,
    phase_system: SystemKind,
    gating_system: SystemKind,
    approximators: Vec<F>,
}

impl<F: FunctionApproximator> Dmp<F> {
    /// Creates an untrained primitive with one approximator per dimension.
    pub fn new(
        tau: f64,
        y_init: DVector<f64>,
        y_attr: DVector<f64>,
        approximators: Vec<F>,
        config: DmpConfig,
    ) -> Result<Self> {
        config.validate()?;
        check_tau(tau)?;
        if y_attr.len() != y_init.len() {
            return Err(DmpBboError::dimension_mismatch("DMP attractor", y_init.len(), y_attr.len()));
        }
        if approximators.len() != y_init.len() {
            return Err(DmpBboError::dimension_mismatch(
                "DMP function approximators",
                y_init.len(),
                approximators.len(),
            ));
        }
        if let Some(fa) = approximators.iter().find(|fa| fa.dim_input() != 1) {
            return Err(DmpBboError::dimension_mismatch(
                "DMP function approximator inputs",
                1,
                fa.dim_input(),
            ));
        }

        let (goal_system, phase_system, gating_system) = build_systems(&config, tau, &y_init, &y_attr);
        Ok(Self {
            spring: SpringDamperSystem::critically_damped(tau, config.damping_coefficient),
            config,
            tau,
            y_init,
            y_attr,
            trained_amplitude: None,
            goal_system,
            phase_system,
            gating_system,
            approximators,
        })
    }

    /// Creates a primitive and trains it on `trajectory`.
    pub fn from_trajectory(trajectory: &Trajectory, approximators: Vec<F>, config: DmpConfig) -> Result<Self> {
        let mut dmp = Self::new(
            trajectory.duration(),
            trajectory.initial_y(),
            trajectory.final_y(),
            approximators,
            config,
        )?;
        dmp.train(trajectory)?;
        Ok(dmp)
    }

    pub fn dim(&self) -> usize {
        self.y_init.len()
    }

    pub fn layout(&self) -> DmpStateLayout {
        DmpStateLayout::new(self.dim())
    }

    pub fn config(&self) -> &DmpConfig {
        &self.config
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn y_init(&self) -> &DVector<f64> {
        &self.y_init
    }

    pub fn y_attr(&self) -> &DVector<f64> {
        &self.y_attr
    }

    pub fn approximators(&self) -> &[F] {
        &self.approximators
    }

    pub fn is_trained(&self) -> bool {
        self.approximators.iter().all(|fa| fa.is_trained())
    }

    pub fn set_tau(&mut self, tau: f64) -> Result<()> {
        check_tau(tau)?;
        self.tau = tau;
        self.spring.set_tau(tau);
        if let Some(goal) = self.goal_system.as_mut() {
            goal.set_tau(tau);
        }
        self.phase_system.set_tau(tau);
        self.gating_system.set_tau(tau);
        Ok(())
    }

    pub fn set_y_init(&mut self, y_init: &DVector<f64>) -> Result<()> {
        if y_init.len() != self.dim() {
            return Err(DmpBboError::dimension_mismatch("DMP initial state", self.dim(), y_init.len()));
        }
        self.y_init = y_init.clone();
        if let Some(goal) = self.goal_system.as_mut() {
            goal.set_x_init(y_init.clone());
        }
        Ok(())
    }

    pub fn set_y_attr(&mut self, y_attr: &DVector<f64>) -> Result<()> {
        if y_attr.len() != self.dim() {
            return Err(DmpBboError::dimension_mismatch("DMP attractor", self.dim(), y_attr.len()));
        }
        self.y_attr = y_attr.clone();
        if let Some(goal) = self.goal_system.as_mut() {
            goal.set_x_attr(y_attr.clone());
        }
        Ok(())
    }

    /// Selects the approximator parameters exposed by the parameter vector.
    pub fn set_selected_param_names(&mut self, names: &[&str]) -> Result<()> {
        for fa in &mut self.approximators {
            fa.set_selected_param_names(names)?;
        }
        Ok(())
    }

    /// Per-dimension forcing-term scale factors `s`.
    pub fn scaling_factors(&self) -> DVector<f64> {
        match (self.config.scaling, &self.trained_amplitude) {
            (ForcingTermScaling::GoalMinusStart, Some(trained)) => {
                let current = &self.y_attr - &self.y_init;
                DVector::from_fn(self.dim(), |d, _| {
                    if trained[d].abs() > f64::EPSILON {
                        current[d] / trained[d]
                    } else {
                        1.0
                    }
                })
            }
            _ => DVector::from_element(self.dim(), 1.0),
        }
    }

    /// Fits the forcing term so that the primitive reproduces `trajectory`.
    ///
    /// Resets `tau`, `y_init` and `y_attr` to the duration, first and last
    /// position of the demonstration, which must start at `t = 0`.
    pub fn train(&mut self, trajectory: &Trajectory) -> Result<()> {
        if trajectory.dim() != self.dim() {
            return Err(DmpBboError::dimension_mismatch(
                "DMP training trajectory",
                self.dim(),
                trajectory.dim(),
            ));
        }
        let ts = trajectory.ts();
        check_starts_at_zero(ts, "DMP training trajectory")?;
        self.set_tau(trajectory.duration())?;
        self.set_y_init(&trajectory.initial_y())?;
        self.set_y_attr(&trajectory.final_y())?;

        let mut phases = DMatrix::zeros(ts.len(), 1);
        let mut targets = DMatrix::zeros(ts.len(), self.dim());
        for (i, &t) in ts.iter().enumerate() {
            let inputs = self.closed_form_inputs(t);
            phases[(i, 0)] = inputs.phase;
            for d in 0..self.dim() {
                let force = self.spring.required_force(
                    trajectory.ys()[(i, d)],
                    trajectory.yds()[(i, d)],
                    trajectory.ydds()[(i, d)],
                    inputs.goal[d],
                );
                targets[(i, d)] = if inputs.gating.abs() > f64::EPSILON {
                    force / inputs.gating
                } else {
                    0.0
                };
            }
        }

        for (d, fa) in self.approximators.iter_mut().enumerate() {
            fa.train(&phases, &targets.column(d).into_owned())?;
        }
        self.trained_amplitude = Some(&self.y_attr - &self.y_init);
        debug!(
            "Trained {}-D DMP on {} samples (tau = {:.3})",
            self.dim(),
            ts.len(),
            self.tau
        );
        Ok(())
    }

    /// Closed-form goal, phase and gating with the spring-damper integrated
    /// by classical Runge-Kutta between consecutive time steps.
    ///
    /// `ts` must be strictly increasing and start at zero.
    pub fn analytical_solution(&self, ts: &DVector<f64>) -> Result<AnalyticalSolution> {
        check_starts_at_zero(ts, "analytical solution")?;
        self.check_trained()?;

        let layout = self.layout();
        let dim = self.dim();
        let n = ts.len();
        let mut xs = DMatrix::zeros(n, layout.dim_x());
        let mut xds = DMatrix::zeros(n, layout.dim_x());
        let mut forcing_terms = DMatrix::zeros(n, dim);
        let mut fa_outputs = DMatrix::zeros(n, dim);

        let mut y = self.y_init.clone();
        let mut z = DVector::zeros(dim);
        for (i, &t) in ts.iter().enumerate() {
            if i > 0 {
                let h = (t - ts[i - 1]) / ANALYTICAL_SUBSTEPS as f64;
                for s in 0..ANALYTICAL_SUBSTEPS {
                    let t0 = ts[i - 1] + s as f64 * h;
                    let (y_new, z_new) = self.spring_rk4_step(t0, h, &y, &z)?;
                    y = y_new;
                    z = z_new;
                }
            }

            let inputs = self.closed_form_inputs(t);
            let (forcing, fa) = self.forcing_term(inputs.phase, inputs.gating)?;
            let (yd, zd) = self.spring_rates(&y, &z, &inputs.goal, &forcing);

            let mut x = layout.zeros();
            x.set_y(&y);
            x.set_z(&z);
            x.set_goal(&inputs.goal);
            x.set_phase(inputs.phase);
            x.set_gating(inputs.gating);

            let mut xd = layout.zeros();
            xd.set_y(&yd);
            xd.set_z(&zd);
            xd.set_goal(&inputs.goal_d);
            xd.set_phase(inputs.phase_d);
            xd.set_gating(inputs.gating_d);

            xs.set_row(i, &x.as_vector().transpose());
            xds.set_row(i, &xd.as_vector().transpose());
            forcing_terms.set_row(i, &forcing.transpose());
            fa_outputs.set_row(i, &fa.transpose());
        }

        Ok(AnalyticalSolution {
            xs,
            xds,
            forcing_terms,
            fa_outputs,
        })
    }

    /// Initial state and its rate of change for the current `y_init`.
    pub fn initial_state(&self) -> Result<(DVector<f64>, DVector<f64>)> {
        let mut x = self.layout().zeros();
        x.set_y(&self.y_init);
        match &self.goal_system {
            Some(goal) => x.set_goal(&goal.x_init()),
            None => x.set_goal(&self.y_attr),
        }
        x.set_phase(self.phase_system.x_init()[0]);
        x.set_gating(self.gating_system.x_init()[0]);
        let xd = self.differential_equation(&x)?;
        Ok((x.into_vector(), xd))
    }

    /// Starts step-wise integration, optionally from a new initial position.
    pub fn integrate_start(&mut self, y_init: Option<&DVector<f64>>) -> Result<(DVector<f64>, DVector<f64>)> {
        if let Some(y) = y_init {
            self.set_y_init(y)?;
        }
        self.initial_state()
    }

    /// Advances state `x` by `dt`, returning the new state and its rate of change.
    pub fn integrate_step(&self, dt: f64, x: &DVector<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        if !(dt > 0.0) {
            return Err(DmpBboError::invalid_input(format!(
                "integration step must be positive, got {}",
                dt
            )));
        }
        let layout = self.layout();
        let state = layout.wrap(x.clone())?;

        let next = match self.config.integration {
            IntegrationMethod::Euler => x + self.differential_equation(&state)? * dt,
            IntegrationMethod::RungeKutta => {
                let k1 = self.differential_equation(&state)?;
                let k2 = self.differential_equation(&layout.wrap(x + &k1 * (0.5 * dt))?)?;
                let k3 = self.differential_equation(&layout.wrap(x + &k2 * (0.5 * dt))?)?;
                let k4 = self.differential_equation(&layout.wrap(x + &k3 * dt)?)?;
                x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
            }
        };

        let mut next = layout.wrap(next)?;
        next.set_phase(self.phase_system.constrain_value(next.phase()));
        let xd = self.differential_equation(&next)?;
        Ok((next.into_vector(), xd))
    }

    /// Integrates step-wise over `ts` from the initial state.
    ///
    /// Returns `T x (3D + 2)` states and rates of change.
    pub fn integrate_steps(&self, ts: &DVector<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        check_time_vector(ts)?;
        let dim_x = self.layout().dim_x();
        let mut xs = DMatrix::zeros(ts.len(), dim_x);
        let mut xds = DMatrix::zeros(ts.len(), dim_x);

        let (mut x, mut xd) = self.initial_state()?;
        for i in 0..ts.len() {
            if i > 0 {
                let (x_new, xd_new) = self.integrate_step(ts[i] - ts[i - 1], &x)?;
                x = x_new;
                xd = xd_new;
            }
            xs.set_row(i, &x.transpose());
            xds.set_row(i, &xd.transpose());
        }
        Ok((xs, xds))
    }

    /// Converts states to positions, velocities and accelerations.
    ///
    /// The acceleration is read from the rate of change of `z = tau * yd`.
    pub fn states_as_trajectory(
        &self,
        ts: &DVector<f64>,
        xs: &DMatrix<f64>,
        xds: &DMatrix<f64>,
    ) -> Result<Trajectory> {
        let layout = self.layout();
        for (name, m) in [("DMP states", xs), ("DMP state derivatives", xds)] {
            if m.nrows() != ts.len() {
                return Err(DmpBboError::dimension_mismatch(name, ts.len(), m.nrows()));
            }
            layout.check(m.ncols(), name)?;
        }
        let dim = self.dim();
        let ys = xs.columns(layout.y().start, dim).into_owned();
        let yds = xds.columns(layout.y().start, dim).into_owned();
        let ydds = xds.columns(layout.z().start, dim) / self.tau;
        Trajectory::new(ts.clone(), ys, yds, ydds, None)
    }

    /// Position, velocity and acceleration of a single state.
    pub fn states_as_pos_vel_acc(
        &self,
        x: &DVector<f64>,
        xd: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>)> {
        let layout = self.layout();
        layout.check(x.len(), "DMP state")?;
        layout.check(xd.len(), "DMP state derivative")?;
        let y = x.rows_range(layout.y()).into_owned();
        let yd = xd.rows_range(layout.y()).into_owned();
        let ydd = xd.rows_range(layout.z()) / self.tau;
        Ok((y, yd, ydd))
    }

    /// Rate of change of the full state.
    pub fn differential_equation(&self, x: &DmpState) -> Result<DVector<f64>> {
        let layout = x.layout();
        let (forcing, _) = self.forcing_term(x.phase(), x.gating())?;
        let goal = x.goal().into_owned();
        let (yd, zd) = self.spring_rates(&x.y().into_owned(), &x.z().into_owned(), &goal, &forcing);

        let mut xd = layout.zeros();
        xd.set_y(&yd);
        xd.set_z(&zd);
        if let Some(goal_system) = &self.goal_system {
            xd.set_goal(&goal_system.differential_equation(&goal));
        }
        xd.set_phase(self.phase_system.rate(x.phase()));
        xd.set_gating(self.gating_system.rate(x.gating()));
        Ok(xd.into_vector())
    }

    /// Forcing terms and raw approximator outputs for one phase/gating pair.
    pub fn forcing_term(&self, phase: f64, gating: f64) -> Result<(DVector<f64>, DVector<f64>)> {
        let mut fa_outputs = DVector::zeros(self.dim());
        for (d, fa) in self.approximators.iter().enumerate() {
            fa_outputs[d] = fa.predict_scalar(phase)?;
        }
        let forcing = fa_outputs.component_mul(&self.scaling_factors()) * gating;
        Ok((forcing, fa_outputs))
    }

    /// Phase of the primitive at time `t`, in closed form.
    pub fn phase_at(&self, t: f64) -> f64 {
        self.phase_system.value_at(t)
    }

    fn check_trained(&self) -> Result<()> {
        if !self.is_trained() {
            return Err(DmpBboError::invalid_input("DMP function approximators are not trained"));
        }
        Ok(())
    }

    fn closed_form_inputs(&self, t: f64) -> Inputs {
        let (goal, goal_d) = match &self.goal_system {
            Some(goal) => goal.analytical_state(t),
            None => (self.y_attr.clone(), DVector::zeros(self.dim())),
        };
        let (phase, phase_d) = self.phase_system.analytical_state(t);
        let (gating, gating_d) = self.gating_system.analytical_state(t);
        Inputs {
            goal,
            goal_d,
            phase: phase[0],
            phase_d: phase_d[0],
            gating: gating[0],
            gating_d: gating_d[0],
        }
    }

    fn spring_rates(
        &self,
        y: &DVector<f64>,
        z: &DVector<f64>,
        goal: &DVector<f64>,
        forcing: &DVector<f64>,
    ) -> (DVector<f64>, DVector<f64>) {
        let mut yd = DVector::zeros(y.len());
        let mut zd = DVector::zeros(y.len());
        for d in 0..y.len() {
            let (a, b) = self.spring.derivatives(y[d], z[d], goal[d], forcing[d]);
            yd[d] = a;
            zd[d] = b;
        }
        (yd, zd)
    }

    /// Spring rates at time `t` with goal and forcing term in closed form.
    fn spring_rates_at(&self, t: f64, y: &DVector<f64>, z: &DVector<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        let inputs = self.closed_form_inputs(t);
        let (forcing, _) = self.forcing_term(inputs.phase, inputs.gating)?;
        Ok(self.spring_rates(y, z, &inputs.goal, &forcing))
    }

    fn spring_rk4_step(
        &self,
        t: f64,
        h: f64,
        y: &DVector<f64>,
        z: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let (ky1, kz1) = self.spring_rates_at(t, y, z)?;
        let (ky2, kz2) = self.spring_rates_at(t + 0.5 * h, &(y + &ky1 * (0.5 * h)), &(z + &kz1 * (0.5 * h)))?;
        let (ky3, kz3) = self.spring_rates_at(t + 0.5 * h, &(y + &ky2 * (0.5 * h)), &(z + &kz2 * (0.5 * h)))?;
        let (ky4, kz4) = self.spring_rates_at(t + h, &(y + &ky3 * h), &(z + &kz3 * h))?;
        let y_new = y + (ky1 + ky2 * 2.0 + ky3 * 2.0 + ky4) * (h / 6.0);
        let z_new = z + (kz1 + kz2 * 2.0 + kz3 * 2.0 + kz4) * (h / 6.0);
        Ok((y_new, z_new))
    }
}

impl<F: FunctionApproximator> Parameterizable for Dmp<F> {
    fn param_vector(&self) -> Result<DVector<f64>> {
        let mut values = Vec::with_capacity(self.param_vector_size());
        for fa in &self.approximators {
            values.extend_from_slice(fa.param_vector()?.as_slice());
        }
        Ok(DVector::from_vec(values))
    }

    fn set_param_vector(&mut self, values: &DVector<f64>) -> Result<()> {
        let expected = self.param_vector_size();
        if values.len() != expected {
            return Err(DmpBboError::dimension_mismatch("DMP parameter vector", expected, values.len()));
        }
        let mut offset = 0;
        for fa in &mut self.approximators {
            let size = fa.param_vector_size();
            fa.set_param_vector(&values.rows(offset, size).into_owned())?;
            offset += size;
        }
        Ok(())
    }

    fn param_vector_size(&self) -> usize {
        self.approximators.iter().map(|fa| fa.param_vector_size()).sum()
    }
}

fn check_tau(tau: f64) -> Result<()> {
    if !(tau > 0.0) || !tau.is_finite() {
        return Err(DmpBboError::invalid_input(format!("tau must be positive, got {}", tau)));
    }
    Ok(())
}

fn build_systems(
    config: &DmpConfig,
    tau: f64,
    y_init: &DVector<f64>,
    y_attr: &DVector<f64>,
) -> (Option<ExponentialSystem>, SystemKind, SystemKind) {
    let goal = || ExponentialSystem::new(tau, y_init.clone(), y_attr.clone(), config.goal_alpha);
    let sigmoid = || {
        SystemKind::Sigmoid(SigmoidSystem::new(
            tau,
            1.0,
            SIGMOID_MAX_RATE,
            SIGMOID_INFLECTION_RATIO,
        ))
    };
    let decay = || SystemKind::Exponential(ExponentialSystem::scalar(tau, 1.0, 0.0, IJSPEERT_ALPHA));

    match config.dmp_type {
        DmpType::Kulvicius2012Joining => (Some(goal()), SystemKind::Time(TimeSystem::new(tau, false)), sigmoid()),
        DmpType::Countdown2013 => (Some(goal()), SystemKind::Time(TimeSystem::new(tau, true)), sigmoid()),
        DmpType::Ijspeert2002Movement => (None, decay(), decay()),
    }
}

fn check_starts_at_zero(ts: &DVector<f64>, what: &str) -> Result<()> {
    check_time_vector(ts)?;
    if ts[0].abs() > 1e-12 {
        return Err(DmpBboError::invalid_input(format!("{} must start at t = 0, got {}", what, ts[0])));
    }
    Ok(())
}
