//! Forecast error types

use thiserror::Error;

/// Result type alias for forecast operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while fitting or evaluating a forecast
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Not enough samples to train
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Training inputs and targets differ in length
    #[error("Length mismatch: {inputs} inputs vs {targets} targets")]
    LengthMismatch { inputs: usize, targets: usize },

    /// Series contains NaN or infinite values
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Model has not been fitted yet
    #[error("Model must be fitted before prediction")]
    NotFitted,

    /// Training produced a non-finite prediction
    #[error("Prediction is not finite ({0})")]
    NonFinite(f64),
}
