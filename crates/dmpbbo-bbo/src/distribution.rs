//! Search distributions over parameter vectors.

use dmpbbo_core::{DmpBboError, Result};
use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use rand_distr::{Distribution as RandDistribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Eigenvalues below this are clipped when the covariance is not
/// numerically positive-definite.
const EIGEN_FLOOR: f64 = 0.0;

pub trait Distribution {
    fn dim(&self) -> usize;

    fn mean(&self) -> &DVector<f64>;

    /// Draws `n_samples` independent samples, one per row.
    fn generate_samples(&self, n_samples: usize, rng: &mut dyn RngCore) -> Result<DMatrix<f64>>;
}

/// Multivariate normal distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionGaussian {
    mean: DVector<f64>,
    covar: DMatrix<f64>,
}

impl DistributionGaussian {
    pub fn new(mean: DVector<f64>, covar: DMatrix<f64>) -> Result<Self> {
        if covar.nrows() != mean.len() || covar.ncols() != mean.len() {
            return Err(DmpBboError::dimension_mismatch(
                "covariance matrix",
                mean.len(),
                if covar.nrows() != mean.len() { covar.nrows() } else { covar.ncols() },
            ));
        }
        if mean.iter().chain(covar.iter()).any(|v| !v.is_finite()) {
            return Err(DmpBboError::invalid_input("distribution contains non-finite values"));
        }
        Ok(Self { mean, covar })
    }

    /// Isotropic distribution with standard deviation `sigma` in every dimension.
    pub fn isotropic(mean: DVector<f64>, sigma: f64) -> Result<Self> {
        let n = mean.len();
        Self::new(mean, DMatrix::identity(n, n) * (sigma * sigma))
    }

    pub fn covar(&self) -> &DMatrix<f64> {
        &self.covar
    }

    /// Largest eigenvalue of the covariance matrix.
    pub fn max_eigen_value(&self) -> f64 {
        self.covar
            .clone()
            .symmetric_eigen()
            .eigenvalues
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// A square root `L` with `L L^T = covar`: the Cholesky factor, or
    /// `V sqrt(Λ)` with clipped eigenvalues if Cholesky fails.
    fn sqrt_covar(&self) -> DMatrix<f64> {
        if let Some(chol) = self.covar.clone().cholesky() {
            return chol.l();
        }
        let eigen = self.covar.clone().symmetric_eigen();
        let sqrt_values = eigen.eigenvalues.map(|v| v.max(EIGEN_FLOOR).sqrt());
        &eigen.eigenvectors * DMatrix::from_diagonal(&sqrt_values)
    }
}

impl Distribution for DistributionGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    fn generate_samples(&self, n_samples: usize, rng: &mut dyn RngCore) -> Result<DMatrix<f64>> {
        let dim = self.dim();
        let l = self.sqrt_covar();
        let mut samples = DMatrix::zeros(n_samples, dim);
        for i in 0..n_samples {
            let z = DVector::from_fn(dim, |_, _| {
                let v: f64 = StandardNormal.sample(&mut *rng);
                v
            });
            let sample = &self.mean + &l * z;
            samples.set_row(i, &sample.transpose());
        }
        Ok(samples)
    }
}
