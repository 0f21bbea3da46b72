use dmpbbo_bbo::{
    keys, n_updates, perform_rollouts, prepare, run_one_update, run_optimization_task, DirectoryStore,
    DistributionGaussian, LearningSession, MemoryStore, OptimizationSetup, TaskSolverDmp, UpdateSummary,
    UpdaterCovarDecay, UpdaterKind, WeightingMethod,
};
use dmpbbo_core::{DmpBboError, Parameterizable, Result, SampleLabel, Task, TaskSolver, Trajectory};
use dmpbbo_dmp::{Dmp, DmpConfig, Rbfn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// Squared distance of the sample to the origin.
#[derive(Debug, Serialize, Deserialize)]
struct Bowl;

impl Task for Bowl {
    fn evaluate_rollout(&self, cost_vars: &DMatrix<f64>, _sample: &DVector<f64>) -> Result<Vec<f64>> {
        Ok(vec![cost_vars.norm_squared()])
    }
}

/// The rollout of a sample is the sample itself.
#[derive(Debug, Serialize, Deserialize)]
struct Echo;

impl TaskSolver for Echo {
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from_row_slice(1, sample.len(), sample.as_slice()))
    }
}

type BowlSetup = OptimizationSetup<Bowl, Echo, UpdaterKind, DVector<f64>>;

fn bowl_setup() -> BowlSetup {
    let start = DVector::from_vec(vec![2.0, 2.0]);
    OptimizationSetup {
        task: Bowl,
        task_solver: Echo,
        updater: UpdaterKind::CovarDecay(UpdaterCovarDecay {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
            covar_decay_factor: 0.8,
        }),
        model: start.clone(),
        distribution: DistributionGaussian::isotropic(start, 1.0).expect("distribution"),
        n_samples_per_update: 20,
        seed: 1234,
    }
}

fn update(session: &mut LearningSession<impl dmpbbo_bbo::ArtifactStore>, i: usize) -> Result<UpdateSummary> {
    run_one_update::<_, Bowl, UpdaterKind, DVector<f64>>(session, i)
}

#[test]
fn bowl_optimization_improves() {
    let mut session = LearningSession::new(MemoryStore::new());
    let summaries = run_optimization_task(&mut session, &bowl_setup(), 5).expect("optimization");
    assert_eq!(summaries.len(), 5);

    // The mean moves downhill every generation.
    for pair in summaries.windows(2) {
        assert!(
            pair[1].cost_eval <= pair[0].cost_eval,
            "eval cost increased from update {} to {}: {} -> {}",
            pair[0].i_update,
            pair[1].i_update,
            pair[0].cost_eval,
            pair[1].cost_eval
        );
    }

    // The best sample of a generation may be worse than an earlier one; the
    // summary keeps the running minimum.
    let mut running_min = f64::INFINITY;
    for summary in &summaries {
        let generation_min = summary.costs.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(summary.best_cost, generation_min);
        running_min = running_min.min(summary.best_cost);
        assert!(
            (summary.best_cost_so_far - running_min).abs() <= 1e-12 * running_min.abs().max(1.0),
            "update {}: best so far {} vs running minimum {}",
            summary.i_update,
            summary.best_cost_so_far,
            running_min
        );
    }

    let first = &summaries[0];
    let last = &summaries[4];
    assert!((first.cost_eval - 8.0).abs() < 1e-12, "initial eval cost {}", first.cost_eval);
    assert!(
        last.cost_eval < 0.5 * first.cost_eval,
        "eval cost did not decrease enough: {} -> {}",
        first.cost_eval,
        last.cost_eval
    );
    assert!(last.mean.norm_squared() < 4.0, "final mean {}", last.mean);
    assert!((last.covar_trace - 2.0 * 0.8f64.powi(10)).abs() < 1e-9);
    assert_eq!(n_updates(&session).expect("n_updates"), 5);
}

#[test]
fn missing_rollout_aborts_update_without_writes() {
    let setup = bowl_setup();
    let mut session = LearningSession::new(MemoryStore::new());
    prepare(&mut session, &setup).expect("prepare");

    // Every stochastic rollout is present, the eval rollout is not.
    for k in 0..setup.n_samples_per_update {
        let label = SampleLabel::Index(k);
        let sample: DVector<f64> = session.ask(keys::SAMPLE, Some(0), Some(label)).expect("sample");
        let cost_vars = Echo.perform_rollout(&sample).expect("rollout");
        session
            .tell(&cost_vars, keys::COST_VARS, Some(0), Some(label))
            .expect("tell cost_vars");
    }
    let n_before = session.store().len();

    match update(&mut session, 0) {
        Err(DmpBboError::MissingData { key, i_update, i_sample }) => {
            assert_eq!(key, keys::COST_VARS);
            assert_eq!(i_update, Some(0));
            assert_eq!(i_sample, Some(SampleLabel::Eval));
        }
        other => panic!("expected MissingData, got {:?}", other),
    }

    assert_eq!(session.store().len(), n_before, "update wrote artifacts before failing");
    for name in [keys::WEIGHTS, keys::DISTRIBUTION_NEW, keys::UPDATE_SUMMARY] {
        assert!(!session.exists(name, Some(0), None).expect("exists"), "{} written", name);
    }
    assert!(!session.exists(keys::SAMPLES, Some(1), None).expect("exists"));
    assert_eq!(n_updates(&session).expect("n_updates"), 0);
}

#[test]
fn rerunning_an_update_is_idempotent() {
    let mut session = LearningSession::new(MemoryStore::new());
    prepare(&mut session, &bowl_setup()).expect("prepare");
    perform_rollouts::<_, Echo>(&mut session, 0).expect("rollouts");

    let first = update(&mut session, 0).expect("first update");
    let samples_first: DMatrix<f64> = session.ask(keys::SAMPLES, Some(1), None).expect("samples");

    let second = update(&mut session, 0).expect("second update");
    let samples_second: DMatrix<f64> = session.ask(keys::SAMPLES, Some(1), None).expect("samples");

    assert_eq!(first, second);
    assert_eq!(samples_first, samples_second);
}

#[test]
fn directory_session_can_be_resumed() {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path().join("bowl");
    {
        let mut session = LearningSession::new(DirectoryStore::new(&root).expect("store"));
        run_optimization_task(&mut session, &bowl_setup(), 2).expect("optimization");
    }
    assert!(root.join("task.json").exists());
    assert!(root.join("update_00001").join("weights.json").exists());
    assert!(root.join("update_00002").join("eval").join("dmp.json").exists());

    // A fresh process picks up where the previous one stopped.
    let mut session = LearningSession::new(DirectoryStore::new(&root).expect("store"));
    let i = n_updates(&session).expect("n_updates");
    assert_eq!(i, 2);
    assert_eq!(perform_rollouts::<_, Echo>(&mut session, i).expect("rollouts"), 21);
    let summary = update(&mut session, i).expect("update");
    assert_eq!(summary.i_update, 2);

    let previous: UpdateSummary = session
        .ask(keys::UPDATE_SUMMARY, Some(1), None)
        .expect("previous summary");
    assert!(summary.best_cost_so_far <= previous.best_cost_so_far);
    assert_eq!(n_updates(&session).expect("n_updates"), 3);
}

/// Squared distance of the final position to `goal`.
#[derive(Debug, Serialize, Deserialize)]
struct ReachGoal {
    goal: f64,
}

impl Task for ReachGoal {
    fn evaluate_rollout(&self, cost_vars: &DMatrix<f64>, _sample: &DVector<f64>) -> Result<Vec<f64>> {
        let traj = Trajectory::from_matrix(cost_vars, 1)?;
        Ok(vec![(traj.final_y()[0] - self.goal).powi(2)])
    }
}

#[test]
fn sampled_dmps_are_stored_per_sample() {
    let ts = DVector::from_fn(51, |i, _| i as f64 / 50.0);
    let demo = Trajectory::from_min_jerk(&ts, &DVector::zeros(1), &DVector::from_element(1, 1.0))
        .expect("min-jerk");
    let dmp = Dmp::from_trajectory(&demo, vec![Rbfn::new(6, 0.7)], DmpConfig::default()).expect("dmp");
    let mean = dmp.param_vector().expect("param vector");

    let setup = OptimizationSetup {
        task: ReachGoal { goal: 1.0 },
        task_solver: TaskSolverDmp::new(dmp.clone(), 0.01, 1.2).expect("solver"),
        updater: UpdaterKind::CovarDecay(UpdaterCovarDecay {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
            covar_decay_factor: 0.9,
        }),
        distribution: DistributionGaussian::isotropic(mean, 5.0).expect("distribution"),
        model: dmp,
        n_samples_per_update: 5,
        seed: 3,
    };

    let mut session = LearningSession::new(MemoryStore::new());
    prepare(&mut session, &setup).expect("prepare");
    perform_rollouts::<_, TaskSolverDmp>(&mut session, 0).expect("rollouts");
    let summary = run_one_update::<_, ReachGoal, UpdaterKind, Dmp>(&mut session, 0).expect("update");
    assert!(summary.costs.iter().all(|c| c.is_finite() && *c >= 0.0));

    for label in SampleLabel::generation(5) {
        let stored: Dmp = session.ask(keys::DMP, Some(1), Some(label)).expect("dmp");
        let sample: DVector<f64> = session.ask(keys::SAMPLE, Some(1), Some(label)).expect("sample");
        assert_eq!(stored.param_vector().expect("param vector"), sample);
    }
    let eval: DVector<f64> = session.ask(keys::SAMPLE, Some(1), Some(SampleLabel::Eval)).expect("eval");
    assert!((eval - &summary.mean).amax() < 1e-12, "eval sample is not the new mean");
}
