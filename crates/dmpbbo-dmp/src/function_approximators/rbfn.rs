//! Radial basis function network.
//!
//! Gaussian kernels on a regular grid over the training input range, output
//! weights fitted by (optionally ridge-regularized) least squares. Widths are
//! chosen so that neighbouring kernels intersect at `intersection_height`.

use dmpbbo_core::{DmpBboError, FunctionApproximator, Parameterizable, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Singular values below this (relative) are ignored in the least-squares solve.
const SVD_EPSILON: f64 = 1e-12;

/// Parameters of the network that may be exposed for optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RbfnParam {
    Centers,
    Widths,
    Weights,
}

impl RbfnParam {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "centers" => Some(RbfnParam::Centers),
            "widths" => Some(RbfnParam::Widths),
            "weights" => Some(RbfnParam::Weights),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RbfnModel {
    /// n_basis x dim_input
    centers: DMatrix<f64>,
    /// n_basis x dim_input
    widths: DMatrix<f64>,
    /// n_basis
    weights: DVector<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rbfn {
    /// Number of kernels along each input dimension.
    n_basis_functions: Vec<usize>,
    intersection_height: f64,
    regularization: f64,
    selected: Vec<RbfnParam>,
    model: Option<RbfnModel>,
}

impl Rbfn {
    /// One-dimensional network with `n_basis_functions` kernels.
    pub fn new(n_basis_functions: usize, intersection_height: f64) -> Self {
        Self::with_grid(vec![n_basis_functions], intersection_height)
    }

    /// Network over a grid with `n_basis_per_dim[j]` kernels along input `j`.
    pub fn with_grid(n_basis_per_dim: Vec<usize>, intersection_height: f64) -> Self {
        Self {
            n_basis_functions: n_basis_per_dim,
            intersection_height,
            regularization: 0.0,
            selected: vec![RbfnParam::Weights],
            model: None,
        }
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn n_basis_functions(&self) -> usize {
        self.n_basis_functions.iter().product()
    }

    /// Selects which parameters form the parameter vector, in the given order.
    ///
    /// Unknown names are rejected.
    pub fn set_selected_param_names(&mut self, names: &[&str]) -> Result<()> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let param = RbfnParam::from_name(name).ok_or_else(|| {
                DmpBboError::config(format!(
                    "unknown RBFN parameter '{}' (expected centers, widths or weights)",
                    name
                ))
            })?;
            if !selected.contains(&param) {
                selected.push(param);
            }
        }
        self.selected = selected;
        Ok(())
    }

    /// Kernel activations, `n_inputs x n_basis`.
    pub fn activations(&self, inputs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let model = self.trained_model()?;
        self.check_inputs(inputs)?;
        Ok(Self::kernel_activations(&model.centers, &model.widths, inputs))
    }

    fn kernel_activations(centers: &DMatrix<f64>, widths: &DMatrix<f64>, inputs: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(inputs.nrows(), centers.nrows(), |i, b| {
            let mut exponent = 0.0;
            for j in 0..inputs.ncols() {
                let scaled = (inputs[(i, j)] - centers[(b, j)]) / widths[(b, j)];
                exponent += scaled * scaled;
            }
            (-0.5 * exponent).exp()
        })
    }

    fn trained_model(&self) -> Result<&RbfnModel> {
        self.model
            .as_ref()
            .ok_or_else(|| DmpBboError::invalid_input("RBFN is not trained"))
    }

    fn check_inputs(&self, inputs: &DMatrix<f64>) -> Result<()> {
        if inputs.ncols() != self.dim_input() {
            return Err(DmpBboError::dimension_mismatch(
                "RBFN input columns",
                self.dim_input(),
                inputs.ncols(),
            ));
        }
        Ok(())
    }

    /// Kernel centers and widths on a regular grid spanning the inputs.
    fn place_kernels(&self, inputs: &DMatrix<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        if !(self.intersection_height > 0.0 && self.intersection_height < 1.0) {
            return Err(DmpBboError::config(format!(
                "intersection height must lie in (0, 1), got {}",
                self.intersection_height
            )));
        }
        if self.n_basis_functions.iter().any(|&n| n == 0) {
            return Err(DmpBboError::config("RBFN needs at least one kernel per dimension"));
        }

        let dim = self.dim_input();
        let mut axis_centers = Vec::with_capacity(dim);
        let mut axis_widths = Vec::with_capacity(dim);
        for j in 0..dim {
            let column = inputs.column(j);
            let (lo, hi) = (column.min(), column.max());
            let n = self.n_basis_functions[j];
            let range = hi - lo;
            if n == 1 || range <= f64::EPSILON {
                axis_centers.push(vec![0.5 * (lo + hi); n.max(1)]);
                axis_widths.push(if range > f64::EPSILON { 0.5 * range } else { 1.0 });
                continue;
            }
            let spacing = range / (n - 1) as f64;
            axis_centers.push((0..n).map(|i| lo + spacing * i as f64).collect::<Vec<_>>());
            // Gaussians at distance `spacing` cross at height h when
            // exp(-0.5 (spacing/2)^2 / w^2) = h.
            axis_widths.push(0.5 * spacing / (-2.0 * self.intersection_height.ln()).sqrt());
        }

        let n_total = self.n_basis_functions();
        let mut centers = DMatrix::zeros(n_total, dim);
        let mut widths = DMatrix::zeros(n_total, dim);
        for b in 0..n_total {
            // Row-major enumeration of the grid, last dimension fastest.
            let mut rest = b;
            for j in (0..dim).rev() {
                let n = axis_centers[j].len();
                centers[(b, j)] = axis_centers[j][rest % n];
                widths[(b, j)] = axis_widths[j];
                rest /= n;
            }
        }
        Ok((centers, widths))
    }

    fn fit_weights(&self, activations: DMatrix<f64>, targets: &DVector<f64>) -> Result<DVector<f64>> {
        if self.regularization > 0.0 {
            let n = activations.ncols();
            let gram = activations.transpose() * &activations
                + DMatrix::identity(n, n) * self.regularization;
            let rhs = activations.transpose() * targets;
            let cholesky = gram
                .cholesky()
                .ok_or_else(|| DmpBboError::numerical("RBFN normal equations are not positive-definite"))?;
            Ok(cholesky.solve(&rhs))
        } else {
            let svd = activations.svd(true, true);
            svd.solve(targets, SVD_EPSILON)
                .map_err(|e| DmpBboError::numerical(format!("RBFN least squares failed: {}", e)))
        }
    }

    fn selected_size(&self, param: RbfnParam) -> usize {
        match param {
            RbfnParam::Weights => self.n_basis_functions(),
            RbfnParam::Centers | RbfnParam::Widths => self.n_basis_functions() * self.dim_input(),
        }
    }
}

impl FunctionApproximator for Rbfn {
    fn dim_input(&self) -> usize {
        self.n_basis_functions.len()
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn train(&mut self, inputs: &DMatrix<f64>, targets: &DVector<f64>) -> Result<()> {
        self.check_inputs(inputs)?;
        if inputs.nrows() != targets.len() {
            return Err(DmpBboError::dimension_mismatch(
                "RBFN training targets",
                inputs.nrows(),
                targets.len(),
            ));
        }
        if inputs.nrows() == 0 {
            return Err(DmpBboError::invalid_input("RBFN training set is empty"));
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(DmpBboError::invalid_input("RBFN training targets contain non-finite values"));
        }

        let (centers, widths) = self.place_kernels(inputs)?;
        let activations = Self::kernel_activations(&centers, &widths, inputs);
        let weights = self.fit_weights(activations, targets)?;
        self.model = Some(RbfnModel {
            centers,
            widths,
            weights,
        });
        Ok(())
    }

    fn predict(&self, inputs: &DMatrix<f64>) -> Result<DVector<f64>> {
        let model = self.trained_model()?;
        self.check_inputs(inputs)?;
        let activations = Self::kernel_activations(&model.centers, &model.widths, inputs);
        Ok(activations * &model.weights)
    }

    fn predict_scalar(&self, input: f64) -> Result<f64> {
        let model = self.trained_model()?;
        if self.dim_input() != 1 {
            return Err(DmpBboError::dimension_mismatch("RBFN input columns", self.dim_input(), 1));
        }
        let mut output = 0.0;
        for b in 0..model.centers.nrows() {
            let scaled = (input - model.centers[(b, 0)]) / model.widths[(b, 0)];
            output += model.weights[b] * (-0.5 * scaled * scaled).exp();
        }
        Ok(output)
    }

    fn set_selected_param_names(&mut self, names: &[&str]) -> Result<()> {
        Rbfn::set_selected_param_names(self, names)
    }
}

impl Parameterizable for Rbfn {
    fn param_vector(&self) -> Result<DVector<f64>> {
        let model = self.trained_model()?;
        let mut values = Vec::with_capacity(self.param_vector_size());
        for param in &self.selected {
            match param {
                RbfnParam::Centers => values.extend_from_slice(model.centers.as_slice()),
                RbfnParam::Widths => values.extend_from_slice(model.widths.as_slice()),
                RbfnParam::Weights => values.extend_from_slice(model.weights.as_slice()),
            }
        }
        Ok(DVector::from_vec(values))
    }

    fn set_param_vector(&mut self, values: &DVector<f64>) -> Result<()> {
        let expected = self.param_vector_size();
        if values.len() != expected {
            return Err(DmpBboError::dimension_mismatch(
                "RBFN parameter vector",
                expected,
                values.len(),
            ));
        }
        let sizes: Vec<(RbfnParam, usize)> = self
            .selected
            .iter()
            .map(|&p| (p, self.selected_size(p)))
            .collect();
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| DmpBboError::invalid_input("RBFN is not trained"))?;

        let mut offset = 0;
        for (param, size) in sizes {
            let chunk = &values.as_slice()[offset..offset + size];
            match param {
                RbfnParam::Centers => model.centers.as_mut_slice().copy_from_slice(chunk),
                RbfnParam::Widths => model.widths.as_mut_slice().copy_from_slice(chunk),
                RbfnParam::Weights => model.weights.as_mut_slice().copy_from_slice(chunk),
            }
            offset += size;
        }
        Ok(())
    }

    fn param_vector_size(&self) -> usize {
        self.selected.iter().map(|&p| self.selected_size(p)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine_data(n: usize) -> (DMatrix<f64>, DVector<f64>) {
        let inputs = DMatrix::from_fn(n, 1, |i, _| i as f64 / (n - 1) as f64);
        let targets = DVector::from_fn(n, |i, _| (2.0 * std::f64::consts::PI * inputs[(i, 0)]).sin());
        (inputs, targets)
    }

    #[test]
    fn test_fits_smooth_function() {
        let (inputs, targets) = sine_data(101);
        let mut rbfn = Rbfn::new(15, 0.7);
        assert!(!rbfn.is_trained());
        rbfn.train(&inputs, &targets).unwrap();
        assert!(rbfn.is_trained());

        let outputs = rbfn.predict(&inputs).unwrap();
        let max_err = (outputs - &targets).amax();
        assert!(max_err < 1e-2, "max fit error {}", max_err);

        let scalar = rbfn.predict_scalar(inputs[(30, 0)]).unwrap();
        assert_relative_eq!(scalar, rbfn.predict(&inputs).unwrap()[30], epsilon = 1e-12);
    }

    #[test]
    fn test_neighbouring_kernels_cross_at_intersection_height() {
        let (inputs, targets) = sine_data(11);
        let mut rbfn = Rbfn::new(5, 0.5);
        rbfn.train(&inputs, &targets).unwrap();
        // Kernels at 0.0 and 0.25 cross halfway.
        let act = rbfn.activations(&DMatrix::from_element(1, 1, 0.125)).unwrap();
        assert_relative_eq!(act[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(act[(0, 1)], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_param_vector_round_trip() {
        let (inputs, targets) = sine_data(51);
        let mut rbfn = Rbfn::new(8, 0.8);
        rbfn.set_selected_param_names(&["weights", "widths"]).unwrap();
        rbfn.train(&inputs, &targets).unwrap();

        assert_eq!(rbfn.param_vector_size(), 16);
        let before = rbfn.predict(&inputs).unwrap();
        let values = rbfn.param_vector().unwrap();
        rbfn.set_param_vector(&values).unwrap();
        assert_eq!(rbfn.param_vector().unwrap(), values);
        assert_eq!(rbfn.predict(&inputs).unwrap(), before);

        let mut scaled = values.clone();
        scaled.rows_mut(0, 8).scale_mut(2.0);
        rbfn.set_param_vector(&scaled).unwrap();
        let after = rbfn.predict(&inputs).unwrap();
        assert_relative_eq!(after, before * 2.0, epsilon = 1e-9);

        assert!(matches!(
            rbfn.set_param_vector(&DVector::zeros(3)),
            Err(DmpBboError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_untrained_and_bad_configuration() {
        let rbfn = Rbfn::new(5, 0.5);
        assert!(matches!(rbfn.param_vector(), Err(DmpBboError::InvalidInput(_))));
        assert!(matches!(
            rbfn.predict(&DMatrix::zeros(1, 1)),
            Err(DmpBboError::InvalidInput(_))
        ));

        let mut bad = Rbfn::new(5, 1.5);
        let (inputs, targets) = sine_data(11);
        assert!(matches!(
            bad.train(&inputs, &targets),
            Err(DmpBboError::ConfigurationError(_))
        ));
        assert!(bad.set_selected_param_names(&["offsets"]).is_err());
    }

    #[test]
    fn test_two_dimensional_grid() {
        let inputs = DMatrix::from_fn(121, 2, |i, j| {
            let (a, b) = (i / 11, i % 11);
            if j == 0 { a as f64 / 10.0 } else { b as f64 / 10.0 }
        });
        let targets = DVector::from_fn(121, |i, _| inputs[(i, 0)] + 2.0 * inputs[(i, 1)]);
        let mut rbfn = Rbfn::with_grid(vec![6, 6], 0.7).with_regularization(1e-9);
        rbfn.train(&inputs, &targets).unwrap();
        assert_eq!(rbfn.dim_input(), 2);
        assert_eq!(rbfn.n_basis_functions(), 36);
        let err = (rbfn.predict(&inputs).unwrap() - &targets).amax();
        assert!(err < 0.05, "2-D fit error {}", err);
    }
}
