//! # dmpbbo-dmp
//!
//! Dynamical movement primitives: a goal-directed spring-damper system whose
//! forcing term is learned from a demonstration, optionally extended with
//! phase-driven schedules.
//!
//! - **Dynamical systems**: exponential, sigmoid, time and spring-damper
//! - **Function approximators**: radial basis function network
//! - **Dmp**: analytical and step-wise integration, training, parameter access
//! - **DmpWithSchedules**: the same, plus schedule prediction

pub mod dmp;
pub mod dmp_with_schedules;
pub mod dynamical_systems;
pub mod function_approximators;
pub mod state;

pub use dmp::{AnalyticalSolution, Dmp, DmpConfig, DmpType, ForcingTermScaling, IntegrationMethod};
pub use dmp_with_schedules::DmpWithSchedules;
pub use dynamical_systems::{DynamicalSystem, SystemKind};
pub use function_approximators::{Rbfn, RbfnParam};
pub use state::{DmpState, DmpStateLayout};
