//! Demo configuration
//!
//! Serde-based TOML configuration for the optimization demos: the movement
//! to start from, the task, the search distribution and the updater.

use crate::tasks::{DemoModel, DemoSolver, DemoTask, TaskForceField, TaskViapoint};
use anyhow::{bail, Context, Result};
use dmpbbo_bbo::{DistributionGaussian, OptimizationSetup, TaskSolverDmp, TaskSolverDmpForceField, UpdaterKind};
use dmpbbo_bbo::{UpdaterCovarDecay, WeightingMethod};
use dmpbbo_core::{Parameterizable, Trajectory};
use dmpbbo_dmp::{Dmp, DmpConfig, DmpWithSchedules, Rbfn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type DemoSetup = OptimizationSetup<DemoTask, DemoSolver, UpdaterKind, DemoModel>;

/// Root configuration for a demo optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub dmp: MovementConfig,

    #[serde(default)]
    pub task: TaskConfig,

    #[serde(default)]
    pub bbo: BboConfig,

    #[serde(default)]
    pub distribution: DistributionConfig,

    #[serde(default = "default_updater")]
    pub updater: UpdaterKind,
}

impl DemoConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        self.dmp.validate()?;
        self.bbo.validate()?;
        if !(self.distribution.sigma > 0.0) {
            bail!("distribution.sigma must be positive, got {}", self.distribution.sigma);
        }
        match &self.updater {
            UpdaterKind::Mean(u) => check_eliteness(u.eliteness)?,
            UpdaterKind::CovarDecay(u) => {
                check_eliteness(u.eliteness)?;
                if !(u.covar_decay_factor > 0.0 && u.covar_decay_factor <= 1.0) {
                    bail!("covar_decay_factor must be in (0, 1], got {}", u.covar_decay_factor);
                }
            }
            UpdaterKind::CovarAdaptation(u) => {
                check_eliteness(u.eliteness)?;
                if let (Some(min), Some(max)) = (u.min_level, u.max_level) {
                    if min > max {
                        bail!("min_level {} exceeds max_level {}", min, max);
                    }
                }
            }
        }
        if let TaskKind::Viapoint = self.task.kind {
            if self.task.viapoint.len() != self.dmp.y_init.len() {
                bail!(
                    "viapoint has {} dimensions, the movement has {}",
                    self.task.viapoint.len(),
                    self.dmp.y_init.len()
                );
            }
        }
        Ok(())
    }

    /// Trains the initial movement and assembles everything `prepare` needs.
    pub fn build_setup(&self) -> Result<DemoSetup> {
        self.validate()?;
        let demo = self.dmp.demonstration()?;
        let dim = demo.dim();
        let approximators = vec![Rbfn::new(self.dmp.n_basis_functions, self.dmp.intersection_height); dim];
        let mut dmp = Dmp::from_trajectory(&demo, approximators, self.dmp.dynamics.clone())
            .context("training the initial DMP")?;
        let names: Vec<&str> = self.dmp.param_names.iter().map(String::as_str).collect();
        dmp.set_selected_param_names(&names)?;

        let (task, task_solver, model) = match self.task.kind {
            TaskKind::Viapoint => {
                let mut viapoint = TaskViapoint::new(self.task.viapoint.clone(), self.task.viapoint_time);
                viapoint.acceleration_weight = self.task.acceleration_weight;
                let solver = TaskSolverDmp::new(dmp.clone(), self.task.dt, self.task.integrate_beyond_tau_factor)?
                    .with_analytical_solution(self.task.use_analytical_solution);
                (
                    DemoTask::Viapoint(viapoint),
                    DemoSolver::Dmp(solver),
                    DemoModel::Dmp(dmp),
                )
            }
            TaskKind::ForceField => {
                let sched = &self.task.schedules;
                let fas = vec![Rbfn::new(sched.n_basis_functions, sched.intersection_height); dim];
                let mut with_schedules = DmpWithSchedules::new(dmp, fas)?
                    .with_schedule_bounds(sched.min, sched.max)
                    .with_schedule_optimization(sched.optimize);
                let targets = DMatrix::from_element(demo.len(), dim, sched.initial_gain);
                with_schedules
                    .train_sched(&demo, Some(&targets))
                    .context("training the gain schedules")?;
                let solver = TaskSolverDmpForceField::new(
                    with_schedules.clone(),
                    self.dmp.n_time_steps,
                    self.task.integrate_beyond_tau_factor,
                    self.task.field_strength,
                )?;
                (
                    DemoTask::ForceField(self.task.force_field.clone()),
                    DemoSolver::ForceField(solver),
                    DemoModel::DmpWithSchedules(with_schedules),
                )
            }
        };

        let mean = model.param_vector()?;
        let distribution = DistributionGaussian::isotropic(mean, self.distribution.sigma)?;
        Ok(OptimizationSetup {
            task,
            task_solver,
            updater: self.updater.clone(),
            model,
            distribution,
            n_samples_per_update: self.bbo.n_samples_per_update,
            seed: self.bbo.seed,
        })
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            dmp: MovementConfig::default(),
            task: TaskConfig::default(),
            bbo: BboConfig::default(),
            distribution: DistributionConfig::default(),
            updater: default_updater(),
        }
    }
}

fn check_eliteness(eliteness: f64) -> Result<()> {
    if !(eliteness > 0.0) {
        bail!("updater eliteness must be positive, got {}", eliteness);
    }
    Ok(())
}

fn default_updater() -> UpdaterKind {
    UpdaterKind::CovarDecay(UpdaterCovarDecay {
        eliteness: 10.0,
        weighting_method: WeightingMethod::PiBb,
        covar_decay_factor: 0.9,
    })
}

/// The demonstrated movement and the DMP trained on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    #[serde(default = "default_duration")]
    pub duration: f64,

    #[serde(default = "default_n_time_steps")]
    pub n_time_steps: usize,

    #[serde(default = "default_y_init")]
    pub y_init: Vec<f64>,

    #[serde(default = "default_y_attr")]
    pub y_attr: Vec<f64>,

    #[serde(default = "default_n_basis_functions")]
    pub n_basis_functions: usize,

    #[serde(default = "default_intersection_height")]
    pub intersection_height: f64,

    /// Approximator parameters exposed to the optimizer.
    #[serde(default = "default_param_names")]
    pub param_names: Vec<String>,

    #[serde(default)]
    pub dynamics: DmpConfig,
}

fn default_duration() -> f64 {
    1.0
}
fn default_n_time_steps() -> usize {
    51
}
fn default_y_init() -> Vec<f64> {
    vec![0.0, 0.0]
}
fn default_y_attr() -> Vec<f64> {
    vec![1.0, 0.5]
}
fn default_n_basis_functions() -> usize {
    8
}
fn default_intersection_height() -> f64 {
    0.95
}
fn default_param_names() -> Vec<String> {
    vec!["weights".to_string()]
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            n_time_steps: default_n_time_steps(),
            y_init: default_y_init(),
            y_attr: default_y_attr(),
            n_basis_functions: default_n_basis_functions(),
            intersection_height: default_intersection_height(),
            param_names: default_param_names(),
            dynamics: DmpConfig::default(),
        }
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.duration > 0.0) {
            bail!("dmp.duration must be positive, got {}", self.duration);
        }
        if self.n_time_steps < 2 {
            bail!("dmp.n_time_steps must be at least 2, got {}", self.n_time_steps);
        }
        if self.y_init.is_empty() || self.y_init.len() != self.y_attr.len() {
            bail!(
                "dmp.y_init ({}) and dmp.y_attr ({}) must be non-empty and of equal length",
                self.y_init.len(),
                self.y_attr.len()
            );
        }
        if self.n_basis_functions == 0 {
            bail!("dmp.n_basis_functions must be at least 1");
        }
        self.dynamics.validate()?;
        Ok(())
    }

    /// Minimum-jerk movement from `y_init` to `y_attr`.
    pub fn demonstration(&self) -> Result<Trajectory> {
        let n = self.n_time_steps;
        let ts = DVector::from_fn(n, |i, _| self.duration * i as f64 / (n - 1) as f64);
        Ok(Trajectory::from_min_jerk(
            &ts,
            &DVector::from_column_slice(&self.y_init),
            &DVector::from_column_slice(&self.y_attr),
        )?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Viapoint,
    ForceField,
}

/// Task and rollout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub kind: TaskKind,

    /// Rollouts last `duration * integrate_beyond_tau_factor`.
    #[serde(default = "default_integrate_beyond_tau_factor")]
    pub integrate_beyond_tau_factor: f64,

    #[serde(default = "default_dt")]
    pub dt: f64,

    #[serde(default)]
    pub use_analytical_solution: bool,

    #[serde(default = "default_viapoint")]
    pub viapoint: Vec<f64>,

    #[serde(default = "default_viapoint_time")]
    pub viapoint_time: Option<f64>,

    #[serde(default)]
    pub acceleration_weight: f64,

    #[serde(default = "default_field_strength")]
    pub field_strength: f64,

    #[serde(default)]
    pub force_field: TaskForceField,

    #[serde(default)]
    pub schedules: ScheduleConfig,
}

fn default_integrate_beyond_tau_factor() -> f64 {
    1.3
}
fn default_dt() -> f64 {
    0.01
}
fn default_viapoint() -> Vec<f64> {
    vec![0.4, 0.7]
}
fn default_viapoint_time() -> Option<f64> {
    Some(0.5)
}
fn default_field_strength() -> f64 {
    20.0
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            kind: TaskKind::default(),
            integrate_beyond_tau_factor: default_integrate_beyond_tau_factor(),
            dt: default_dt(),
            use_analytical_solution: false,
            viapoint: default_viapoint(),
            viapoint_time: default_viapoint_time(),
            acceleration_weight: 0.0,
            field_strength: default_field_strength(),
            force_field: TaskForceField::default(),
            schedules: ScheduleConfig::default(),
        }
    }
}

/// Gain schedules of the force-field task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_initial_gain")]
    pub initial_gain: f64,

    #[serde(default = "default_schedule_min")]
    pub min: Option<f64>,

    #[serde(default = "default_schedule_max")]
    pub max: Option<f64>,

    #[serde(default = "default_schedule_basis")]
    pub n_basis_functions: usize,

    #[serde(default = "default_intersection_height")]
    pub intersection_height: f64,

    /// Optimize the schedules along with the movement.
    #[serde(default = "default_optimize_schedules")]
    pub optimize: bool,
}

fn default_initial_gain() -> f64 {
    500.0
}
fn default_schedule_min() -> Option<f64> {
    Some(100.0)
}
fn default_schedule_max() -> Option<f64> {
    Some(2000.0)
}
fn default_schedule_basis() -> usize {
    7
}
fn default_optimize_schedules() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            initial_gain: default_initial_gain(),
            min: default_schedule_min(),
            max: default_schedule_max(),
            n_basis_functions: default_schedule_basis(),
            intersection_height: default_intersection_height(),
            optimize: default_optimize_schedules(),
        }
    }
}

/// Optimization loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BboConfig {
    #[serde(default = "default_n_samples_per_update")]
    pub n_samples_per_update: usize,

    #[serde(default = "default_n_updates")]
    pub n_updates: usize,

    #[serde(default)]
    pub seed: u64,
}

fn default_n_samples_per_update() -> usize {
    10
}
fn default_n_updates() -> usize {
    20
}

impl Default for BboConfig {
    fn default() -> Self {
        Self {
            n_samples_per_update: default_n_samples_per_update(),
            n_updates: default_n_updates(),
            seed: 0,
        }
    }
}

impl BboConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_samples_per_update == 0 {
            bail!("bbo.n_samples_per_update must be at least 1");
        }
        Ok(())
    }
}

/// Initial search distribution around the trained parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

fn default_sigma() -> f64 {
    10.0
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self { sigma: default_sigma() }
    }
}
