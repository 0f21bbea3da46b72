//! # dmpbbo-bbo
//!
//! Black-box optimization of movement primitives: search distributions,
//! reward-weighted updaters, the artifact session and the update driver.
//!
//! ## Update cycle
//! ```text
//! prepare ─► samples(0) ─► rollouts(0) ─► run_one_update(0) ─► samples(1) ─► …
//! ```
//! Rollouts may happen in-process ([`driver::perform_rollouts`]) or in any
//! other process that reads `sample`/`dmp` artifacts and writes `cost_vars`.

pub mod distribution;
pub mod driver;
pub mod session;
pub mod task_solvers;
pub mod updaters;

pub use distribution::{Distribution, DistributionGaussian};
pub use driver::{
    generate_samples, n_updates, perform_rollouts, prepare, run_one_update, run_optimization_task,
    OptimizationSetup, UpdateSummary,
};
pub use session::{keys, ArtifactKey, ArtifactStore, DirectoryStore, LearningSession, MemoryStore};
pub use task_solvers::{ForceFieldColumns, TaskSolverDmp, TaskSolverDmpForceField};
pub use updaters::{
    costs_to_weights, Updater, UpdaterCovarAdaptation, UpdaterCovarDecay, UpdaterKind, UpdaterMean,
    WeightingMethod,
};
