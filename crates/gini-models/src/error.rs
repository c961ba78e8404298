//! Model errors.

use thiserror::Error;

/// Result type for model fitting.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while fitting models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Matrix could not be inverted
    #[error("Singular matrix: {0}")]
    Singular(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Probability distribution could not be constructed
    #[error("Distribution error: {0}")]
    Distribution(String),

    /// Unknown county or node name
    #[error("Unknown name: {0}")]
    UnknownName(String),
}
