//! Regressor contract shared by the forecast models.

use crate::error::{ForecastError, Result};

/// A single-input regression model following the fit/predict pattern.
///
/// `fit` always trains from scratch; calling it twice discards the first fit.
pub trait Regressor: Send {
    /// Fit the model to `(inputs[i], targets[i])` pairs
    fn fit(&mut self, inputs: &[f64], targets: &[f64]) -> Result<()>;

    /// Evaluate the fitted function at `x`
    fn predict(&self, x: f64) -> Result<f64>;

    /// Short model name for logs
    fn name(&self) -> &'static str;
}

/// Affine map to zero mean / unit variance and back.
///
/// A series with no spread keeps a scale of 1 so it maps to all zeros.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardizer {
    pub mean: f64,
    pub scale: f64,
}

impl Standardizer {
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                scale: 1.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > 1e-12 { std } else { 1.0 };
        Self { mean, scale }
    }

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    pub fn invert(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }

    pub fn apply_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.apply(*v)).collect()
    }
}

/// Reject empty, mismatched or non-finite training sets
pub(crate) fn validate_training_data(inputs: &[f64], targets: &[f64]) -> Result<()> {
    if inputs.len() != targets.len() {
        return Err(ForecastError::LengthMismatch {
            inputs: inputs.len(),
            targets: targets.len(),
        });
    }
    if inputs.is_empty() {
        return Err(ForecastError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if inputs.iter().chain(targets).any(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidData(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizer_round_trip_on_known_values() {
        let s = Standardizer::fit(&[2.0, 4.0, 6.0]);
        assert!((s.mean - 4.0).abs() < 1e-12);
        assert!((s.apply(4.0)).abs() < 1e-12);
        assert!((s.invert(s.apply(7.5)) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_standardizer_constant_series() {
        let s = Standardizer::fit(&[3.0; 12]);
        assert_eq!(s.scale, 1.0);
        assert_eq!(s.apply_all(&[3.0, 3.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_validate_rejects_mismatch_and_nan() {
        assert!(matches!(
            validate_training_data(&[0.0, 1.0], &[1.0]),
            Err(ForecastError::LengthMismatch { .. })
        ));
        assert!(matches!(
            validate_training_data(&[0.0, 1.0], &[1.0, f64::NAN]),
            Err(ForecastError::InvalidData(_))
        ));
        assert!(validate_training_data(&[0.0], &[1.0]).is_ok());
    }
}
