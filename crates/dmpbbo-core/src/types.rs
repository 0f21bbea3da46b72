//! Core data types: sample labels and trajectories.

use crate::errors::{DmpBboError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of one sample inside a generation.
///
/// `Eval` is the noiseless rollout of the distribution mean. It runs through
/// the same rollout pipeline as the stochastic samples but is never fed to
/// the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SampleLabel {
    Index(usize),
    Eval,
}

impl SampleLabel {
    /// All labels of a generation with `n_samples` stochastic samples, eval last.
    pub fn generation(n_samples: usize) -> Vec<SampleLabel> {
        let mut labels: Vec<SampleLabel> = (0..n_samples).map(SampleLabel::Index).collect();
        labels.push(SampleLabel::Eval);
        labels
    }

    pub fn is_eval(&self) -> bool {
        matches!(self, SampleLabel::Eval)
    }
}

impl fmt::Display for SampleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleLabel::Index(i) => write!(f, "{}", i),
            SampleLabel::Eval => write!(f, "eval"),
        }
    }
}

/// Checks that `ts` is non-empty and strictly increasing.
pub fn check_time_vector(ts: &DVector<f64>) -> Result<()> {
    if ts.is_empty() {
        return Err(DmpBboError::invalid_input("time vector is empty"));
    }
    if let Some(i) = (1..ts.len()).find(|&i| !(ts[i] > ts[i - 1])) {
        return Err(DmpBboError::invalid_input(format!(
            "time vector must be strictly increasing (t[{}]={} <= t[{}]={})",
            i,
            ts[i],
            i - 1,
            ts[i - 1]
        )));
    }
    Ok(())
}

/// Ordered sequence of (time, position, velocity, acceleration) over `D`
/// dimensions, optionally carrying `M` columns of auxiliary data.
///
/// # Invariants
/// - `ts` is non-empty and strictly increasing
/// - `ys`, `yds`, `ydds` (and `misc`, if present) have `ts.len()` rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    ts: DVector<f64>,
    ys: DMatrix<f64>,
    yds: DMatrix<f64>,
    ydds: DMatrix<f64>,
    misc: Option<DMatrix<f64>>,
}

impl Trajectory {
    pub fn new(
        ts: DVector<f64>,
        ys: DMatrix<f64>,
        yds: DMatrix<f64>,
        ydds: DMatrix<f64>,
        misc: Option<DMatrix<f64>>,
    ) -> Result<Self> {
        check_time_vector(&ts)?;
        let n = ts.len();
        let dim = ys.ncols();
        for (name, m) in [("ys", &ys), ("yds", &yds), ("ydds", &ydds)] {
            if m.nrows() != n {
                return Err(DmpBboError::dimension_mismatch(
                    format!("trajectory {} rows", name),
                    n,
                    m.nrows(),
                ));
            }
            if m.ncols() != dim {
                return Err(DmpBboError::dimension_mismatch(
                    format!("trajectory {} columns", name),
                    dim,
                    m.ncols(),
                ));
            }
        }
        if let Some(misc) = &misc {
            if misc.nrows() != n {
                return Err(DmpBboError::dimension_mismatch(
                    "trajectory misc rows",
                    n,
                    misc.nrows(),
                ));
            }
        }
        Ok(Self {
            ts,
            ys,
            yds,
            ydds,
            misc,
        })
    }

    /// Minimum-jerk trajectory from `y_from` to `y_to` over the span of `ts`.
    pub fn from_min_jerk(ts: &DVector<f64>, y_from: &DVector<f64>, y_to: &DVector<f64>) -> Result<Self> {
        check_time_vector(ts)?;
        if y_from.len() != y_to.len() {
            return Err(DmpBboError::dimension_mismatch(
                "min-jerk end points",
                y_from.len(),
                y_to.len(),
            ));
        }
        let n = ts.len();
        let dim = y_from.len();
        let t0 = ts[0];
        let duration = ts[n - 1] - t0;
        if duration <= 0.0 {
            return Err(DmpBboError::invalid_input(
                "min-jerk trajectory needs at least two time points",
            ));
        }

        let mut ys = DMatrix::zeros(n, dim);
        let mut yds = DMatrix::zeros(n, dim);
        let mut ydds = DMatrix::zeros(n, dim);
        for (i, &t) in ts.iter().enumerate() {
            let tau = (t - t0) / duration;
            let (tau2, tau3) = (tau * tau, tau * tau * tau);
            let (tau4, tau5) = (tau3 * tau, tau3 * tau2);
            for d in 0..dim {
                let amplitude = y_to[d] - y_from[d];
                ys[(i, d)] = y_from[d] + amplitude * (6.0 * tau5 - 15.0 * tau4 + 10.0 * tau3);
                yds[(i, d)] = amplitude * (30.0 * tau4 - 60.0 * tau3 + 30.0 * tau2) / duration;
                ydds[(i, d)] =
                    amplitude * (120.0 * tau3 - 180.0 * tau2 + 60.0 * tau) / (duration * duration);
            }
        }
        Self::new(ts.clone(), ys, yds, ydds, None)
    }

    /// Inverse of [`Trajectory::as_matrix`].
    pub fn from_matrix(matrix: &DMatrix<f64>, dim: usize) -> Result<Self> {
        let required = 1 + 3 * dim;
        if matrix.ncols() < required {
            return Err(DmpBboError::dimension_mismatch(
                "trajectory matrix columns",
                required,
                matrix.ncols(),
            ));
        }
        let n = matrix.nrows();
        let ts = matrix.column(0).into_owned();
        let ys = matrix.columns(1, dim).into_owned();
        let yds = matrix.columns(1 + dim, dim).into_owned();
        let ydds = matrix.columns(1 + 2 * dim, dim).into_owned();
        let n_misc = matrix.ncols() - required;
        let misc = (n_misc > 0).then(|| matrix.columns(required, n_misc).into_owned());
        debug_assert_eq!(ts.len(), n);
        Self::new(ts, ys, yds, ydds, misc)
    }

    /// Columns: `t | y (D) | yd (D) | ydd (D) | misc (M)`.
    pub fn as_matrix(&self) -> DMatrix<f64> {
        let n = self.len();
        let dim = self.dim();
        let n_misc = self.dim_misc();
        let mut m = DMatrix::zeros(n, 1 + 3 * dim + n_misc);
        m.set_column(0, &self.ts);
        m.columns_mut(1, dim).copy_from(&self.ys);
        m.columns_mut(1 + dim, dim).copy_from(&self.yds);
        m.columns_mut(1 + 2 * dim, dim).copy_from(&self.ydds);
        if let Some(misc) = &self.misc {
            m.columns_mut(1 + 3 * dim, n_misc).copy_from(misc);
        }
        m
    }

    pub fn set_misc(&mut self, misc: Option<DMatrix<f64>>) -> Result<()> {
        if let Some(m) = &misc {
            if m.nrows() != self.len() {
                return Err(DmpBboError::dimension_mismatch(
                    "trajectory misc rows",
                    self.len(),
                    m.nrows(),
                ));
            }
        }
        self.misc = misc;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.ys.ncols()
    }

    pub fn dim_misc(&self) -> usize {
        self.misc.as_ref().map_or(0, |m| m.ncols())
    }

    pub fn duration(&self) -> f64 {
        self.ts[self.len() - 1] - self.ts[0]
    }

    pub fn ts(&self) -> &DVector<f64> {
        &self.ts
    }

    pub fn ys(&self) -> &DMatrix<f64> {
        &self.ys
    }

    pub fn yds(&self) -> &DMatrix<f64> {
        &self.yds
    }

    pub fn ydds(&self) -> &DMatrix<f64> {
        &self.ydds
    }

    pub fn misc(&self) -> Option<&DMatrix<f64>> {
        self.misc.as_ref()
    }

    pub fn initial_y(&self) -> DVector<f64> {
        self.ys.row(0).transpose()
    }

    pub fn final_y(&self) -> DVector<f64> {
        self.ys.row(self.len() - 1).transpose()
    }
}
