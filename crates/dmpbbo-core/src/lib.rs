//! # dmpbbo-core
//!
//! Core types, traits, and errors for black-box optimization of dynamical
//! movement primitives.
//!
//! - **Types**: trajectories and sample labels
//! - **Traits**: `Parameterizable`, `FunctionApproximator`, `Task`, `TaskSolver`
//! - **Errors**: unified error handling with `DmpBboError`
//!
//! ## Architecture
//! ```text
//! ┌─────────────────┐
//! │  dmpbbo-core    │  ← Core types/traits
//! └─────────────────┘
//!         ▲
//!    ┌────┴─────────┐
//! ┌──▼─────────┐    │
//! │ dmpbbo-dmp │    │
//! └──▲─────────┘    │
//!    │      ┌───────┴─────┐
//!    └──────┤ dmpbbo-bbo  │
//!           └──────▲──────┘
//!           ┌──────┴──────┐
//!           │ dmpbbo-cli  │
//!           └─────────────┘
//! ```

pub mod errors;
pub mod traits;
pub mod types;

pub use errors::{DmpBboError, Result};
pub use traits::{FunctionApproximator, Parameterizable, Task, TaskSolver};
pub use types::{check_time_vector, SampleLabel, Trajectory};
