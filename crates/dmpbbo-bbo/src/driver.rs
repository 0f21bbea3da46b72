//! Closed-loop optimization driver.
//!
//! One optimization is a sequence of generations. Generation `i` is created
//! by [`generate_samples`], its rollouts are produced by
//! [`perform_rollouts`] (in this process or by any other process with access
//! to the same store) and it is closed by [`run_one_update`], which also
//! creates generation `i + 1`.
//!
//! All state lives in the [`LearningSession`]; every function reads what it
//! needs from the store, so an update can be resumed or re-run at any time.

use crate::distribution::{Distribution, DistributionGaussian};
use crate::session::{keys, ArtifactKey, ArtifactStore, LearningSession};
use crate::updaters::Updater;
use dmpbbo_core::{DmpBboError, Parameterizable, Result, SampleLabel, Task, TaskSolver};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything needed to start an optimization.
///
/// `model` is the parameterizable object whose parameter vector is searched
/// (usually a DMP); a copy with the sampled parameters is stored per sample.
#[derive(Debug, Clone)]
pub struct OptimizationSetup<T, TS, U, M> {
    pub task: T,
    pub task_solver: TS,
    pub updater: U,
    pub model: M,
    pub distribution: DistributionGaussian,
    pub n_samples_per_update: usize,
    pub seed: u64,
}

/// Outcome of one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub i_update: usize,
    /// Scalar cost of every stochastic sample, in sample order.
    pub costs: Vec<f64>,
    /// Scalar cost of the distribution mean.
    pub cost_eval: f64,
    /// Lowest scalar cost in this generation.
    pub best_cost: f64,
    /// Lowest scalar cost over this and all earlier generations.
    pub best_cost_so_far: f64,
    pub weights: DVector<f64>,
    pub mean: DVector<f64>,
    pub covar_trace: f64,
}

impl UpdateSummary {
    pub fn emit_telemetry(&self) -> HashMap<String, serde_json::Value> {
        let mut telemetry = HashMap::new();
        telemetry.insert("bbo_update".to_string(), serde_json::json!(self.i_update));
        telemetry.insert("bbo_cost_eval".to_string(), serde_json::json!(self.cost_eval));
        telemetry.insert("bbo_best_cost".to_string(), serde_json::json!(self.best_cost));
        telemetry.insert(
            "bbo_best_cost_so_far".to_string(),
            serde_json::json!(self.best_cost_so_far),
        );
        telemetry.insert(
            "bbo_mean_cost".to_string(),
            serde_json::json!(self.costs.iter().sum::<f64>() / self.costs.len().max(1) as f64),
        );
        telemetry.insert("bbo_covar_trace".to_string(), serde_json::json!(self.covar_trace));
        telemetry
    }
}

/// RNG for the samples of generation `i_update`; one ChaCha stream per update.
fn update_rng(seed: u64, i_update: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(i_update as u64);
    rng
}

/// Writes the global artifacts and generation 0.
pub fn prepare<S, T, TS, U, M>(
    session: &mut LearningSession<S>,
    setup: &OptimizationSetup<T, TS, U, M>,
) -> Result<Vec<ArtifactKey>>
where
    S: ArtifactStore,
    T: Serialize,
    TS: Serialize,
    U: Serialize,
    M: Parameterizable + Serialize + Clone,
{
    if setup.n_samples_per_update == 0 {
        return Err(DmpBboError::config("n_samples_per_update must be at least 1"));
    }
    let n_params = setup.model.param_vector_size();
    if setup.distribution.dim() != n_params {
        return Err(DmpBboError::dimension_mismatch(
            "search distribution vs. model parameters",
            n_params,
            setup.distribution.dim(),
        ));
    }

    session.tell(&setup.task, keys::TASK, None, None)?;
    session.tell(&setup.task_solver, keys::TASK_SOLVER, None, None)?;
    session.tell(&setup.updater, keys::UPDATER, None, None)?;
    session.tell(&setup.n_samples_per_update, keys::N_SAMPLES_PER_UPDATE, None, None)?;
    session.tell(&setup.seed, keys::SEED, None, None)?;
    session.tell(&setup.model, keys::DMP_INITIAL, None, None)?;
    session.tell(&setup.distribution, keys::DISTRIBUTION_INITIAL, None, None)?;

    info!(
        "Prepared optimization: {} parameters, {} samples per update, seed {}",
        n_params, setup.n_samples_per_update, setup.seed
    );
    generate_samples(
        session,
        0,
        &setup.distribution,
        &setup.model,
        setup.n_samples_per_update,
        setup.seed,
    )
}

/// Samples generation `i_update` from `distribution`.
///
/// Writes `distribution(i)`, `samples(i)` and, for every sample label
/// including `eval`, the parameter vector `sample(i, s)` and the model
/// `dmp(i, s)` carrying it. Returns the keys of the models awaiting rollouts.
pub fn generate_samples<S, M>(
    session: &mut LearningSession<S>,
    i_update: usize,
    distribution: &DistributionGaussian,
    model: &M,
    n_samples: usize,
    seed: u64,
) -> Result<Vec<ArtifactKey>>
where
    S: ArtifactStore,
    M: Parameterizable + Serialize + Clone,
{
    let mut rng = update_rng(seed, i_update);
    let samples = distribution.generate_samples(n_samples, &mut rng)?;

    session.tell(distribution, keys::DISTRIBUTION, Some(i_update), None)?;
    session.tell(&samples, keys::SAMPLES, Some(i_update), None)?;

    let mut pending = Vec::with_capacity(n_samples + 1);
    for label in SampleLabel::generation(n_samples) {
        let sample = match label {
            SampleLabel::Index(k) => samples.row(k).transpose(),
            SampleLabel::Eval => distribution.mean().clone(),
        };
        let mut sampled_model = model.clone();
        sampled_model.set_param_vector(&sample)?;

        session.tell(&sample, keys::SAMPLE, Some(i_update), Some(label))?;
        pending.push(session.tell(&sampled_model, keys::DMP, Some(i_update), Some(label))?);
    }
    debug!("Generated {} samples (+ eval) for update {}", n_samples, i_update);
    Ok(pending)
}

/// Runs the stored task solver on every sample of generation `i_update`
/// that has no `cost_vars` yet. Returns the number of rollouts performed.
pub fn perform_rollouts<S, TS>(session: &mut LearningSession<S>, i_update: usize) -> Result<usize>
where
    S: ArtifactStore,
    TS: TaskSolver + DeserializeOwned,
{
    let n_samples: usize = session.ask(keys::N_SAMPLES_PER_UPDATE, None, None)?;
    let task_solver: TS = session.ask(keys::TASK_SOLVER, None, None)?;

    let mut n_performed = 0;
    for label in SampleLabel::generation(n_samples) {
        if session.exists(keys::COST_VARS, Some(i_update), Some(label))? {
            continue;
        }
        let sample: DVector<f64> = session.ask(keys::SAMPLE, Some(i_update), Some(label))?;
        let cost_vars = task_solver.perform_rollout(&sample)?;
        session.tell(&cost_vars, keys::COST_VARS, Some(i_update), Some(label))?;
        n_performed += 1;
    }
    debug!("Performed {} rollouts for update {}", n_performed, i_update);
    Ok(n_performed)
}

/// Closes generation `i_update` and creates generation `i_update + 1`.
///
/// Fails with `MissingData` before writing anything if a rollout of the
/// generation (eval included) is absent.
pub fn run_one_update<S, T, U, M>(session: &mut LearningSession<S>, i_update: usize) -> Result<UpdateSummary>
where
    S: ArtifactStore,
    T: Task + DeserializeOwned,
    U: Updater + DeserializeOwned,
    M: Parameterizable + Serialize + DeserializeOwned + Clone,
{
    let n_samples: usize = session.ask(keys::N_SAMPLES_PER_UPDATE, None, None)?;
    let labels = SampleLabel::generation(n_samples);

    let mut rollouts = Vec::with_capacity(labels.len());
    for &label in &labels {
        let cost_vars: DMatrix<f64> = session.ask(keys::COST_VARS, Some(i_update), Some(label))?;
        let sample: DVector<f64> = session.ask(keys::SAMPLE, Some(i_update), Some(label))?;
        rollouts.push((label, cost_vars, sample));
    }
    let task: T = session.ask(keys::TASK, None, None)?;
    let distribution: DistributionGaussian = session.ask(keys::DISTRIBUTION, Some(i_update), None)?;
    let samples: DMatrix<f64> = session.ask(keys::SAMPLES, Some(i_update), None)?;
    let updater: U = session.ask(keys::UPDATER, None, None)?;
    let model: M = session.ask(keys::DMP_INITIAL, None, None)?;
    let seed: u64 = session.ask(keys::SEED, None, None)?;

    let mut evaluated = Vec::with_capacity(rollouts.len());
    for (label, cost_vars, sample) in &rollouts {
        let costs = task.evaluate_rollout(cost_vars, sample)?;
        let cost = *costs.first().ok_or_else(|| {
            DmpBboError::invalid_input(format!("task returned no costs for sample {}", label))
        })?;
        evaluated.push((*label, costs, cost));
    }

    let mut costs = Vec::with_capacity(n_samples);
    let mut cost_eval = f64::NAN;
    for (label, cost_components, cost) in &evaluated {
        session.tell(cost_components, keys::COSTS, Some(i_update), Some(*label))?;
        match label {
            SampleLabel::Index(_) => costs.push(*cost),
            SampleLabel::Eval => cost_eval = *cost,
        }
    }

    let (distribution_new, weights) = updater.update_distribution(&distribution, &samples, &costs)?;
    session.tell(&weights, keys::WEIGHTS, Some(i_update), None)?;
    session.tell(&distribution_new, keys::DISTRIBUTION_NEW, Some(i_update), None)?;

    let best_cost = costs.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut best_cost_so_far = best_cost;
    if i_update > 0 && session.exists(keys::UPDATE_SUMMARY, Some(i_update - 1), None)? {
        let previous: UpdateSummary = session.ask(keys::UPDATE_SUMMARY, Some(i_update - 1), None)?;
        best_cost_so_far = best_cost_so_far.min(previous.best_cost_so_far);
    }

    let summary = UpdateSummary {
        i_update,
        costs,
        cost_eval,
        best_cost,
        best_cost_so_far,
        weights,
        mean: distribution_new.mean().clone(),
        covar_trace: distribution_new.covar().trace(),
    };
    session.tell(&summary, keys::UPDATE_SUMMARY, Some(i_update), None)?;
    info!(
        "Update {}: eval cost {:.6e}, best {:.6e}, best so far {:.6e}, covar trace {:.3e}",
        i_update, summary.cost_eval, summary.best_cost, summary.best_cost_so_far, summary.covar_trace
    );

    generate_samples(session, i_update + 1, &distribution_new, &model, n_samples, seed)?;
    Ok(summary)
}

/// Number of completed updates, i.e. the index of the generation that awaits
/// its update.
pub fn n_updates<S: ArtifactStore>(session: &LearningSession<S>) -> Result<usize> {
    let mut i = 0;
    while session.exists(keys::UPDATE_SUMMARY, Some(i), None)? {
        i += 1;
    }
    Ok(i)
}

/// Prepares and runs `n_updates` generations in this process.
pub fn run_optimization_task<S, T, TS, U, M>(
    session: &mut LearningSession<S>,
    setup: &OptimizationSetup<T, TS, U, M>,
    n_updates: usize,
) -> Result<Vec<UpdateSummary>>
where
    S: ArtifactStore,
    T: Task + Serialize + DeserializeOwned,
    TS: TaskSolver + Serialize + DeserializeOwned,
    U: Updater + Serialize + DeserializeOwned,
    M: Parameterizable + Serialize + DeserializeOwned + Clone,
{
    prepare(session, setup)?;
    let mut summaries = Vec::with_capacity(n_updates);
    for i_update in 0..n_updates {
        perform_rollouts::<S, TS>(session, i_update)?;
        summaries.push(run_one_update::<S, T, U, M>(session, i_update)?);
    }
    Ok(summaries)
}
