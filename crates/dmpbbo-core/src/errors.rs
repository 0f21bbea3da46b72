//! Error types for DMP optimization.
//!
//! Every error is raised at the point of detection and never retried inside
//! the core. A failed update cycle is re-run wholesale once the upstream cause
//! is fixed.

use crate::types::SampleLabel;
use thiserror::Error;

/// Unified error type for all DMP/BBO operations.
#[derive(Error, Debug)]
pub enum DmpBboError {
    /// Malformed time vectors, non-positive step sizes, untrained models
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parameter-vector, state or schedule dimensionality mismatches
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Missing or inconsistent configuration (e.g. no schedule targets)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A required artifact is absent from the session store
    #[error("Missing data: '{key}' (update {i_update:?}, sample {i_sample:?})")]
    MissingData {
        key: String,
        i_update: Option<usize>,
        i_sample: Option<SampleLabel>,
    },

    /// Numerical failures that regularization cannot absorb (NaN, failed solves)
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// I/O errors (artifact store on disk)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl DmpBboError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        DmpBboError::InvalidInput(message.into())
    }

    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        DmpBboError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        DmpBboError::ConfigurationError(message.into())
    }

    /// Creates a missing data error for an artifact address.
    pub fn missing(
        key: impl Into<String>,
        i_update: Option<usize>,
        i_sample: Option<SampleLabel>,
    ) -> Self {
        DmpBboError::MissingData {
            key: key.into(),
            i_update,
            i_sample,
        }
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        DmpBboError::NumericalError(message.into())
    }

    /// True if the failure is caused by absent upstream artifacts.
    ///
    /// The external session driver owns the retry policy for these.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, DmpBboError::MissingData { .. })
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DmpBboError>;
