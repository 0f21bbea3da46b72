//! Demo tasks and the serializable unions the session stores.

use dmpbbo_bbo::{ForceFieldColumns, TaskSolverDmp, TaskSolverDmpForceField};
use dmpbbo_core::{DmpBboError, Parameterizable, Result, Task, TaskSolver, Trajectory};
use dmpbbo_dmp::{Dmp, DmpWithSchedules};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Pass through a viapoint with little acceleration.
///
/// Costs: `[total, viapoint distance, mean squared acceleration, goal distance]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskViapoint {
    pub viapoint: Vec<f64>,
    /// Time at which the viapoint should be reached; any time if absent.
    #[serde(default)]
    pub viapoint_time: Option<f64>,
    /// Distances within this radius cost nothing.
    #[serde(default)]
    pub viapoint_radius: f64,
    #[serde(default)]
    pub goal: Option<Vec<f64>>,
    /// Goal distance is averaged over `t >= goal_time`.
    #[serde(default)]
    pub goal_time: f64,
    #[serde(default = "default_viapoint_weight")]
    pub viapoint_weight: f64,
    #[serde(default)]
    pub acceleration_weight: f64,
    #[serde(default)]
    pub goal_weight: f64,
}

fn default_viapoint_weight() -> f64 {
    1.0
}

impl TaskViapoint {
    pub fn new(viapoint: Vec<f64>, viapoint_time: Option<f64>) -> Self {
        Self {
            viapoint,
            viapoint_time,
            viapoint_radius: 0.0,
            goal: None,
            goal_time: 0.0,
            viapoint_weight: default_viapoint_weight(),
            acceleration_weight: 0.0,
            goal_weight: 0.0,
        }
    }

    pub fn dim(&self) -> usize {
        self.viapoint.len()
    }
}

impl Task for TaskViapoint {
    fn evaluate_rollout(&self, cost_vars: &DMatrix<f64>, _sample: &DVector<f64>) -> Result<Vec<f64>> {
        let traj = Trajectory::from_matrix(cost_vars, self.dim())?;
        let viapoint = DVector::from_column_slice(&self.viapoint);
        let dist_at = |i: usize| (traj.ys().row(i).transpose() - &viapoint).norm();

        let mut dist_viapoint = match self.viapoint_time {
            Some(t) => {
                let i = traj
                    .ts()
                    .iter()
                    .enumerate()
                    .min_by(|a, b| (a.1 - t).abs().total_cmp(&(b.1 - t).abs()))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                dist_at(i)
            }
            None => (0..traj.len()).map(dist_at).fold(f64::INFINITY, f64::min),
        };
        dist_viapoint = (dist_viapoint - self.viapoint_radius).max(0.0);

        let acceleration = traj.ydds().norm_squared() / traj.len() as f64;

        let mut dist_goal = 0.0;
        if let Some(goal) = &self.goal {
            if goal.len() != self.dim() {
                return Err(DmpBboError::dimension_mismatch("viapoint task goal", self.dim(), goal.len()));
            }
            let goal = DVector::from_column_slice(goal);
            let after: Vec<f64> = (0..traj.len())
                .filter(|&i| traj.ts()[i] >= self.goal_time)
                .map(|i| (traj.ys().row(i).transpose() - &goal).norm())
                .collect();
            if !after.is_empty() {
                dist_goal = after.iter().sum::<f64>() / after.len() as f64;
            }
        }

        let total = self.viapoint_weight * dist_viapoint
            + self.acceleration_weight * acceleration
            + self.goal_weight * dist_goal;
        Ok(vec![total, dist_viapoint, acceleration, dist_goal])
    }

    fn cost_component_labels(&self) -> Vec<String> {
        ["total", "viapoint", "acceleration", "goal"].map(String::from).to_vec()
    }
}

/// Track the desired movement under a force field with low gains.
///
/// Costs: `[total, mean squared tracking error, mean gain]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskForceField {
    #[serde(default = "default_tracking_weight")]
    pub tracking_weight: f64,
    #[serde(default = "default_gain_weight")]
    pub gain_weight: f64,
}

fn default_tracking_weight() -> f64 {
    100.0
}

fn default_gain_weight() -> f64 {
    1e-4
}

impl Default for TaskForceField {
    fn default() -> Self {
        Self {
            tracking_weight: default_tracking_weight(),
            gain_weight: default_gain_weight(),
        }
    }
}

impl Task for TaskForceField {
    fn evaluate_rollout(&self, cost_vars: &DMatrix<f64>, _sample: &DVector<f64>) -> Result<Vec<f64>> {
        let n_cols = cost_vars.ncols();
        if n_cols < 9 || (n_cols - 2) % 7 != 0 {
            return Err(DmpBboError::invalid_input(format!(
                "force-field rollout has {} columns, expected 2 + 7 D",
                n_cols
            )));
        }
        let cols = ForceFieldColumns::new((n_cols - 2) / 7);
        let dim = cols.y_des().len();
        let n = (cost_vars.nrows() * dim).max(1) as f64;

        let errors = cost_vars.columns(cols.y_cur().start, dim) - cost_vars.columns(cols.y_des().start, dim);
        let tracking = errors.norm_squared() / n;
        let gains = cost_vars.columns(cols.schedules().start, dim).sum() / n;

        let total = self.tracking_weight * tracking + self.gain_weight * gains;
        Ok(vec![total, tracking, gains])
    }

    fn cost_component_labels(&self) -> Vec<String> {
        ["total", "tracking", "gains"].map(String::from).to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DemoTask {
    Viapoint(TaskViapoint),
    ForceField(TaskForceField),
}

impl Task for DemoTask {
    fn evaluate_rollout(&self, cost_vars: &DMatrix<f64>, sample: &DVector<f64>) -> Result<Vec<f64>> {
        match self {
            DemoTask::Viapoint(t) => t.evaluate_rollout(cost_vars, sample),
            DemoTask::ForceField(t) => t.evaluate_rollout(cost_vars, sample),
        }
    }

    fn cost_component_labels(&self) -> Vec<String> {
        match self {
            DemoTask::Viapoint(t) => t.cost_component_labels(),
            DemoTask::ForceField(t) => t.cost_component_labels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DemoSolver {
    Dmp(TaskSolverDmp),
    ForceField(TaskSolverDmpForceField),
}

impl TaskSolver for DemoSolver {
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<DMatrix<f64>> {
        match self {
            DemoSolver::Dmp(s) => s.perform_rollout(sample),
            DemoSolver::ForceField(s) => s.perform_rollout(sample),
        }
    }
}

/// The optimized model stored as `dmp_initial` and `dmp(i, s)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DemoModel {
    Dmp(Dmp),
    DmpWithSchedules(DmpWithSchedules),
}

impl Parameterizable for DemoModel {
    fn param_vector(&self) -> Result<DVector<f64>> {
        match self {
            DemoModel::Dmp(m) => m.param_vector(),
            DemoModel::DmpWithSchedules(m) => m.param_vector(),
        }
    }

    fn set_param_vector(&mut self, values: &DVector<f64>) -> Result<()> {
        match self {
            DemoModel::Dmp(m) => m.set_param_vector(values),
            DemoModel::DmpWithSchedules(m) => m.set_param_vector(values),
        }
    }

    fn param_vector_size(&self) -> usize {
        match self {
            DemoModel::Dmp(m) => m.param_vector_size(),
            DemoModel::DmpWithSchedules(m) => m.param_vector_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_rollout(n: usize) -> DMatrix<f64> {
        // y = t on [0, 1], constant velocity, no acceleration.
        let ts = DVector::from_fn(n, |i, _| i as f64 / (n - 1) as f64);
        let ys = DMatrix::from_fn(n, 1, |i, _| ts[i]);
        let yds = DMatrix::from_element(n, 1, 1.0);
        Trajectory::new(ts, ys, yds, DMatrix::zeros(n, 1), None)
            .unwrap()
            .as_matrix()
    }

    #[test]
    fn test_viapoint_on_path_costs_nothing() {
        let task = TaskViapoint::new(vec![0.5], Some(0.5));
        let costs = task.evaluate_rollout(&line_rollout(11), &DVector::zeros(1)).unwrap();
        assert_eq!(costs.len(), 4);
        assert!(costs[0].abs() < 1e-12, "costs {:?}", costs);

        let off = TaskViapoint::new(vec![0.8], Some(0.5));
        let costs = off.evaluate_rollout(&line_rollout(11), &DVector::zeros(1)).unwrap();
        assert!((costs[1] - 0.3).abs() < 1e-12, "costs {:?}", costs);

        // Without a time the closest point of the path counts.
        let anytime = TaskViapoint::new(vec![0.8], None);
        let costs = anytime.evaluate_rollout(&line_rollout(11), &DVector::zeros(1)).unwrap();
        assert!(costs[1].abs() < 1e-12, "costs {:?}", costs);
    }

    #[test]
    fn test_viapoint_goal_and_radius() {
        let mut task = TaskViapoint::new(vec![0.8], Some(0.5));
        task.viapoint_radius = 0.1;
        task.goal = Some(vec![1.0]);
        task.goal_time = 1.0;
        task.goal_weight = 2.0;
        let costs = task.evaluate_rollout(&line_rollout(11), &DVector::zeros(1)).unwrap();
        assert!((costs[1] - 0.2).abs() < 1e-12, "costs {:?}", costs);
        assert!(costs[3].abs() < 1e-12, "costs {:?}", costs);
        assert!((costs[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_force_field_cost() {
        let cols = ForceFieldColumns::new(1);
        let mut cost_vars = DMatrix::zeros(4, cols.n_columns());
        for i in 0..4 {
            cost_vars[(i, cols.y_des().start)] = 1.0;
            cost_vars[(i, cols.y_cur().start)] = 0.9;
            cost_vars[(i, cols.schedules().start)] = 200.0;
        }
        let task = TaskForceField {
            tracking_weight: 10.0,
            gain_weight: 0.001,
        };
        let costs = task.evaluate_rollout(&cost_vars, &DVector::zeros(1)).unwrap();
        assert!((costs[1] - 0.01).abs() < 1e-12, "costs {:?}", costs);
        assert!((costs[2] - 200.0).abs() < 1e-9, "costs {:?}", costs);
        assert!((costs[0] - 0.3).abs() < 1e-9, "costs {:?}", costs);

        assert!(task
            .evaluate_rollout(&DMatrix::zeros(4, 5), &DVector::zeros(1))
            .is_err());
    }

    #[test]
    fn test_demo_task_serde() {
        let task = DemoTask::ForceField(TaskForceField::default());
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"type\":\"force_field\""));
        let back: DemoTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
