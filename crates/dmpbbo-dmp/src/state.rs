//! Typed view on the expanded DMP state vector.
//!
//! Layout: `[y (D) | z (D) | goal (D) | phase | gating]`, with `z = tau * yd`.

use dmpbbo_core::{DmpBboError, Result};
use nalgebra::{DVector, DVectorView};
use std::ops::Range;

/// Index ranges of the sub-systems inside a state vector of a `dim`-D DMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmpStateLayout {
    dim: usize,
}

impl DmpStateLayout {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Dimensionality of the movement (`D`).
    pub fn dim_y(&self) -> usize {
        self.dim
    }

    /// Length of the full state vector, `3 D + 2`.
    pub fn dim_x(&self) -> usize {
        3 * self.dim + 2
    }

    pub fn y(&self) -> Range<usize> {
        0..self.dim
    }

    pub fn z(&self) -> Range<usize> {
        self.dim..2 * self.dim
    }

    pub fn goal(&self) -> Range<usize> {
        2 * self.dim..3 * self.dim
    }

    pub fn phase(&self) -> usize {
        3 * self.dim
    }

    pub fn gating(&self) -> usize {
        3 * self.dim + 1
    }

    /// Fails with `DimensionMismatch` unless `len` equals [`DmpStateLayout::dim_x`].
    pub fn check(&self, len: usize, context: &str) -> Result<()> {
        if len != self.dim_x() {
            return Err(DmpBboError::dimension_mismatch(context, self.dim_x(), len));
        }
        Ok(())
    }

    /// All-zero state.
    pub fn zeros(&self) -> DmpState {
        DmpState {
            layout: *self,
            values: DVector::zeros(self.dim_x()),
        }
    }

    /// Wraps an existing vector, checking its length.
    pub fn wrap(&self, values: DVector<f64>) -> Result<DmpState> {
        self.check(values.len(), "DMP state")?;
        Ok(DmpState {
            layout: *self,
            values,
        })
    }
}

/// One state (or state derivative) vector with named sub-slices.
#[derive(Debug, Clone, PartialEq)]
pub struct DmpState {
    layout: DmpStateLayout,
    values: DVector<f64>,
}

impl DmpState {
    pub fn layout(&self) -> DmpStateLayout {
        self.layout
    }

    pub fn y(&self) -> DVectorView<'_, f64> {
        self.values.rows_range(self.layout.y())
    }

    pub fn z(&self) -> DVectorView<'_, f64> {
        self.values.rows_range(self.layout.z())
    }

    pub fn goal(&self) -> DVectorView<'_, f64> {
        self.values.rows_range(self.layout.goal())
    }

    pub fn phase(&self) -> f64 {
        self.values[self.layout.phase()]
    }

    pub fn gating(&self) -> f64 {
        self.values[self.layout.gating()]
    }

    pub fn set_y(&mut self, y: &DVector<f64>) {
        self.values.rows_range_mut(self.layout.y()).copy_from(y);
    }

    pub fn set_z(&mut self, z: &DVector<f64>) {
        self.values.rows_range_mut(self.layout.z()).copy_from(z);
    }

    pub fn set_goal(&mut self, goal: &DVector<f64>) {
        self.values.rows_range_mut(self.layout.goal()).copy_from(goal);
    }

    pub fn set_phase(&mut self, phase: f64) {
        let i = self.layout.phase();
        self.values[i] = phase;
    }

    pub fn set_gating(&mut self, gating: f64) {
        let i = self.layout.gating();
        self.values[i] = gating;
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn into_vector(self) -> DVector<f64> {
        self.values
    }
}
