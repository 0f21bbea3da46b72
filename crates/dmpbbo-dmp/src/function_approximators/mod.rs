//! Function approximators implementing [`dmpbbo_core::FunctionApproximator`].

pub mod rbfn;

pub use rbfn::{Rbfn, RbfnParam};
