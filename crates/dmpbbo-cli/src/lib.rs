//! Configuration and demo tasks behind the `dmpbbo` binary.

pub mod config;
pub mod tasks;

pub use config::{DemoConfig, DemoSetup, TaskKind};
pub use tasks::{DemoModel, DemoSolver, DemoTask, TaskForceField, TaskViapoint};
