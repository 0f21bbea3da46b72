//! Cost-to-weight mapping and distribution updaters.
//!
//! All updaters share the same first step: costs are turned into normalized,
//! non-negative weights, and the new mean is the weighted average of the
//! samples. They differ in what happens to the covariance.

use crate::distribution::{Distribution, DistributionGaussian};
use dmpbbo_core::{DmpBboError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Absolute lower bound on covariance eigenvalues after adaptation.
const MIN_EIGEN_VALUE: f64 = 1e-12;

/// How costs are mapped to weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    /// `exp(-h (c - c_min) / (c_max - c_min))`, with `h` the eliteness.
    PiBb,
    /// Uniform over the `mu` best samples.
    Cem,
    /// `ln(mu + 1/2) - ln(rank)` over the `mu` best samples.
    CmaEs,
}

/// Maps costs to weights that are non-negative and sum to one.
///
/// For `Cem` and `CmaEs`, `eliteness` is the number of samples that receive
/// weight. Equal costs give uniform weights for every method.
pub fn costs_to_weights(costs: &[f64], method: WeightingMethod, eliteness: f64) -> Result<DVector<f64>> {
    let n = costs.len();
    if n == 0 {
        return Err(DmpBboError::invalid_input("cannot compute weights for zero costs"));
    }
    if let Some(c) = costs.iter().find(|c| !c.is_finite()) {
        return Err(DmpBboError::invalid_input(format!("cost {} is not finite", c)));
    }

    let c_min = costs.iter().cloned().fold(f64::INFINITY, f64::min);
    let c_max = costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if c_max - c_min <= f64::EPSILON * c_max.abs().max(1.0) {
        return Ok(DVector::from_element(n, 1.0 / n as f64));
    }

    let mut weights = DVector::zeros(n);
    match method {
        WeightingMethod::PiBb => {
            for (w, &c) in weights.iter_mut().zip(costs) {
                *w = (-eliteness * (c - c_min) / (c_max - c_min)).exp();
            }
        }
        WeightingMethod::Cem | WeightingMethod::CmaEs => {
            let mu = (eliteness.round() as usize).clamp(1, n);
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
            for (rank, &i) in order.iter().take(mu).enumerate() {
                weights[i] = match method {
                    WeightingMethod::Cem => 1.0,
                    _ => (mu as f64 + 0.5).ln() - ((rank + 1) as f64).ln(),
                };
            }
        }
    }

    let sum = weights.sum();
    if !(sum > 0.0) {
        return Ok(DVector::from_element(n, 1.0 / n as f64));
    }
    Ok(weights / sum)
}

pub trait Updater {
    /// New distribution and the per-sample weights that produced it.
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[f64],
    ) -> Result<(DistributionGaussian, DVector<f64>)>;
}

/// Weights from costs and weighted mean, shared by all updaters.
fn weighted_mean(
    distribution: &DistributionGaussian,
    samples: &DMatrix<f64>,
    costs: &[f64],
    method: WeightingMethod,
    eliteness: f64,
) -> Result<(DVector<f64>, DVector<f64>)> {
    if samples.ncols() != distribution.dim() {
        return Err(DmpBboError::dimension_mismatch(
            "sample dimensionality",
            distribution.dim(),
            samples.ncols(),
        ));
    }
    if samples.nrows() != costs.len() {
        return Err(DmpBboError::dimension_mismatch("costs per sample", samples.nrows(), costs.len()));
    }
    let weights = costs_to_weights(costs, method, eliteness)?;
    let mean = samples.transpose() * &weights;
    Ok((mean, weights))
}

/// Updates the mean only; the covariance is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterMean {
    pub eliteness: f64,
    pub weighting_method: WeightingMethod,
}

impl Updater for UpdaterMean {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[f64],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        let (mean, weights) = weighted_mean(distribution, samples, costs, self.weighting_method, self.eliteness)?;
        let new = DistributionGaussian::new(mean, distribution.covar().clone())?;
        Ok((new, weights))
    }
}

/// Updates the mean and shrinks the covariance by `covar_decay_factor^2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterCovarDecay {
    pub eliteness: f64,
    pub weighting_method: WeightingMethod,
    pub covar_decay_factor: f64,
}

impl Updater for UpdaterCovarDecay {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[f64],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        let (mean, weights) = weighted_mean(distribution, samples, costs, self.weighting_method, self.eliteness)?;
        let decay = self.covar_decay_factor * self.covar_decay_factor;
        let new = DistributionGaussian::new(mean, distribution.covar() * decay)?;
        Ok((new, weights))
    }
}

/// Reward-weighted covariance matrix adaptation.
///
/// The covariance is the weighted scatter of the samples around the previous
/// mean, optionally low-pass filtered and restricted to its diagonal.
/// Eigenvalues are clamped to `[min_level, max_level]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterCovarAdaptation {
    pub eliteness: f64,
    pub weighting_method: WeightingMethod,
    #[serde(default)]
    pub max_level: Option<f64>,
    #[serde(default)]
    pub min_level: Option<f64>,
    #[serde(default)]
    pub diag_only: bool,
    /// 1.0 replaces the covariance, smaller values blend with the previous one.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl UpdaterCovarAdaptation {
    fn clamp_eigenvalues(&self, covar: DMatrix<f64>) -> DMatrix<f64> {
        // Symmetrize first; accumulated round-off breaks the eigen solver's assumptions.
        let covar = (&covar + covar.transpose()) * 0.5;
        let mut eigen = covar.symmetric_eigen();
        let floor = self.min_level.unwrap_or(0.0).max(MIN_EIGEN_VALUE);
        for v in eigen.eigenvalues.iter_mut() {
            *v = v.max(floor);
            if let Some(max) = self.max_level {
                *v = v.min(max.max(floor));
            }
        }
        eigen.recompose()
    }
}

impl Updater for UpdaterCovarAdaptation {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[f64],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        let (mean, weights) = weighted_mean(distribution, samples, costs, self.weighting_method, self.eliteness)?;

        let dim = distribution.dim();
        let mut scatter = DMatrix::zeros(dim, dim);
        for (i, &w) in weights.iter().enumerate() {
            let diff = samples.row(i).transpose() - distribution.mean();
            scatter += &diff * diff.transpose() * w;
        }
        if self.diag_only {
            scatter = DMatrix::from_diagonal(&scatter.diagonal());
        }
        let lr = self.learning_rate.clamp(0.0, 1.0);
        let blended = distribution.covar() * (1.0 - lr) + scatter * lr;

        let new = DistributionGaussian::new(mean, self.clamp_eigenvalues(blended))?;
        Ok((new, weights))
    }
}

/// Serializable choice of updater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdaterKind {
    Mean(UpdaterMean),
    CovarDecay(UpdaterCovarDecay),
    CovarAdaptation(UpdaterCovarAdaptation),
}

impl Updater for UpdaterKind {
    fn update_distribution(
        &self,
        distribution: &DistributionGaussian,
        samples: &DMatrix<f64>,
        costs: &[f64],
    ) -> Result<(DistributionGaussian, DVector<f64>)> {
        match self {
            UpdaterKind::Mean(u) => u.update_distribution(distribution, samples, costs),
            UpdaterKind::CovarDecay(u) => u.update_distribution(distribution, samples, costs),
            UpdaterKind::CovarAdaptation(u) => u.update_distribution(distribution, samples, costs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples() -> DMatrix<f64> {
        DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0])
    }

    fn distribution() -> DistributionGaussian {
        DistributionGaussian::isotropic(DVector::from_vec(vec![0.5, 0.5]), 1.0).unwrap()
    }

    #[test]
    fn test_weights_are_normalized_and_ordered() {
        let costs = [3.0, 1.0, 2.0, 4.0];
        for method in [WeightingMethod::PiBb, WeightingMethod::Cem, WeightingMethod::CmaEs] {
            let w = costs_to_weights(&costs, method, 2.0).unwrap();
            assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-12);
            assert!(w.iter().all(|&x| x >= 0.0));
            assert!(w[1] >= w[2] && w[2] >= w[0] && w[0] >= w[3], "{:?}: {}", method, w);
        }

        let cem = costs_to_weights(&costs, WeightingMethod::Cem, 2.0).unwrap();
        assert_eq!(cem.as_slice(), &[0.0, 0.5, 0.5, 0.0]);

        let cma = costs_to_weights(&costs, WeightingMethod::CmaEs, 2.0).unwrap();
        assert!(cma[1] > cma[2] && cma[0] == 0.0);
    }

    #[test]
    fn test_equal_costs_give_uniform_weights() {
        for method in [WeightingMethod::PiBb, WeightingMethod::Cem, WeightingMethod::CmaEs] {
            let w = costs_to_weights(&[2.5; 5], method, 3.0).unwrap();
            assert_relative_eq!(w, DVector::from_element(5, 0.2), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_costs() {
        assert!(costs_to_weights(&[], WeightingMethod::PiBb, 10.0).is_err());
        assert!(costs_to_weights(&[1.0, f64::NAN], WeightingMethod::PiBb, 10.0).is_err());
    }

    #[test]
    fn test_equal_costs_give_plain_average() {
        let updater = UpdaterMean {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
        };
        let (new, weights) = updater
            .update_distribution(&distribution(), &samples(), &[1.0; 4])
            .unwrap();
        assert_relative_eq!(weights, DVector::from_element(4, 0.25), epsilon = 1e-12);
        assert_relative_eq!(new.mean().clone(), DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-12);
        assert_eq!(new.covar(), distribution().covar());
    }

    #[test]
    fn test_covar_decay() {
        let updater = UpdaterCovarDecay {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
            covar_decay_factor: 0.8,
        };
        let (new, weights) = updater
            .update_distribution(&distribution(), &samples(), &[4.0, 3.0, 2.0, 0.0])
            .unwrap();
        assert_relative_eq!(new.covar()[(0, 0)], 0.64, epsilon = 1e-12);
        assert!(weights[3] > weights[0]);
        assert!(new.mean()[0] > 0.5 && new.mean()[1] > 0.5);
    }

    #[test]
    fn test_covar_adaptation_stays_positive_definite() {
        // Fewer samples than dimensions: the scatter is rank-deficient.
        let dist = DistributionGaussian::isotropic(DVector::zeros(3), 1.0).unwrap();
        let samples = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let updater = UpdaterCovarAdaptation {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
            max_level: Some(10.0),
            min_level: Some(0.01),
            diag_only: false,
            learning_rate: 1.0,
        };
        let (new, _) = updater.update_distribution(&dist, &samples, &[1.0, 2.0]).unwrap();
        assert!(new.covar().clone().cholesky().is_some());
        let eigen = new.covar().clone().symmetric_eigen();
        assert!(eigen.eigenvalues.iter().all(|&v| v >= 0.01 - 1e-9 && v <= 10.0 + 1e-9));
    }

    #[test]
    fn test_covar_adaptation_degenerate_samples() {
        // All samples at the previous mean: scatter is zero, floor kicks in.
        let dist = DistributionGaussian::isotropic(DVector::zeros(2), 1.0).unwrap();
        let samples = DMatrix::zeros(3, 2);
        let updater = UpdaterCovarAdaptation {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
            max_level: None,
            min_level: None,
            diag_only: true,
            learning_rate: 1.0,
        };
        let (new, _) = updater.update_distribution(&dist, &samples, &[1.0, 1.0, 1.0]).unwrap();
        assert!(new.covar().clone().cholesky().is_some());
        assert_eq!(new.covar()[(0, 1)], 0.0);
    }

    #[test]
    fn test_updater_kind_serde() {
        let kind = UpdaterKind::CovarDecay(UpdaterCovarDecay {
            eliteness: 10.0,
            weighting_method: WeightingMethod::PiBb,
            covar_decay_factor: 0.9,
        });
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"covar_decay\""));
        let back: UpdaterKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);

        let err = kind.update_distribution(&distribution(), &samples(), &[1.0, 2.0]);
        assert!(matches!(err, Err(DmpBboError::DimensionMismatch { .. })));
    }
}
