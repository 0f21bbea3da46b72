//! Capability traits shared by models, tasks and solvers.

use crate::errors::{DmpBboError, Result};
use nalgebra::{DMatrix, DVector};

/// A model whose selected trainable parameters can be read and written as one
/// flat, order-stable vector.
///
/// `set_param_vector(&param_vector()?)` must be the identity, and the vector
/// length must stay fixed for as long as the selected parameter subset does.
pub trait Parameterizable {
    /// Current values of the selected parameters.
    fn param_vector(&self) -> Result<DVector<f64>>;

    /// Overwrites the selected parameters. Fails with `DimensionMismatch` on
    /// length mismatch.
    fn set_param_vector(&mut self, values: &DVector<f64>) -> Result<()>;

    /// Length of the vector returned by [`Parameterizable::param_vector`].
    fn param_vector_size(&self) -> usize;
}

/// A raw parameter vector is its own model. Used when the optimized object is
/// not a movement primitive (benchmark functions, plain vectors).
impl Parameterizable for DVector<f64> {
    fn param_vector(&self) -> Result<DVector<f64>> {
        Ok(self.clone())
    }

    fn set_param_vector(&mut self, values: &DVector<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(DmpBboError::dimension_mismatch(
                "parameter vector",
                self.len(),
                values.len(),
            ));
        }
        self.copy_from(values);
        Ok(())
    }

    fn param_vector_size(&self) -> usize {
        self.len()
    }
}

/// Regression capability consumed by the movement primitives.
///
/// Inputs are `n_samples x dim_input` matrices; targets and predictions are
/// one value per row.
pub trait FunctionApproximator: Parameterizable {
    fn dim_input(&self) -> usize;

    fn is_trained(&self) -> bool;

    fn train(&mut self, inputs: &DMatrix<f64>, targets: &DVector<f64>) -> Result<()>;

    fn predict(&self, inputs: &DMatrix<f64>) -> Result<DVector<f64>>;

    /// Prediction for a single scalar input.
    fn predict_scalar(&self, input: f64) -> Result<f64> {
        let outputs = self.predict(&DMatrix::from_element(1, 1, input))?;
        Ok(outputs[0])
    }

    /// Chooses which model parameters make up the parameter vector.
    fn set_selected_param_names(&mut self, names: &[&str]) -> Result<()> {
        Err(DmpBboError::config(format!(
            "parameter selection {:?} is not supported by this approximator",
            names
        )))
    }
}

/// Turns a rollout into cost components.
///
/// The first component is the scalar used for optimization; later components
/// are diagnostic. All components are non-negative.
pub trait Task {
    fn evaluate_rollout(&self, cost_vars: &DMatrix<f64>, sample: &DVector<f64>) -> Result<Vec<f64>>;

    /// Human-readable names of the cost components, in order.
    fn cost_component_labels(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Turns one parameter sample into the cost-relevant variables of a rollout.
pub trait TaskSolver {
    fn perform_rollout(&self, sample: &DVector<f64>) -> Result<DMatrix<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_is_parameterizable() {
        let mut v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let p = v.param_vector().unwrap();
        v.set_param_vector(&p).unwrap();
        assert_eq!(v, p);

        let err = v.set_param_vector(&DVector::zeros(2));
        assert!(matches!(
            err,
            Err(DmpBboError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }
}
