use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::linear::{self, LinearTrend};
use crate::mlp::{self, Mlp};
use crate::regressor::Regressor;

/// Samples required before the first forecast
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// Which regressor the engine trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Linear,
    Mlp,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: ModelChoice,
    pub min_samples: usize,
    /// Training iterations; `None` uses the model default
    pub epochs: Option<usize>,
    /// Step size; `None` uses the model default
    pub learning_rate: Option<f64>,
    /// Initialization seed for stochastic models
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            min_samples: DEFAULT_MIN_SAMPLES,
            epochs: None,
            learning_rate: None,
            seed: None,
        }
    }
}

/// Next-step forecast for both tracked metrics.
///
/// Both fields are set together or neither is.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Prediction {
    pub next_temperature: Option<f64>,
    pub next_humidity: Option<f64>,
}

impl Prediction {
    pub fn new(next_temperature: f64, next_humidity: f64) -> Self {
        Self {
            next_temperature: Some(next_temperature),
            next_humidity: Some(next_humidity),
        }
    }

    /// No forecast yet
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.next_temperature.is_some() && self.next_humidity.is_some()
    }
}

/// Stateless retrain-and-predict service.
///
/// Every call fits a new model from scratch on the series it is given.
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: EngineConfig,
}

impl ForecastEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn min_samples(&self) -> usize {
        self.config.min_samples
    }

    fn build_model(&self) -> Box<dyn Regressor> {
        match self.config.model {
            ModelChoice::Linear => Box::new(LinearTrend::new(
                self.config.epochs.unwrap_or(linear::DEFAULT_EPOCHS),
                self.config
                    .learning_rate
                    .unwrap_or(linear::DEFAULT_LEARNING_RATE),
            )),
            ModelChoice::Mlp => Box::new(Mlp::new(
                self.config.epochs.unwrap_or(mlp::DEFAULT_EPOCHS),
                self.config.learning_rate.unwrap_or(mlp::DEFAULT_LEARNING_RATE),
                self.config.seed,
            )),
        }
    }

    /// Predict the value at index `series.len()` from a series sampled at
    /// indices `0..series.len()`.
    ///
    /// # Errors
    /// `InsufficientData` below the minimum sample count, `InvalidData` for
    /// NaN/infinite input, `NonFinite` if training diverged.
    pub fn predict_next(&self, series: &[f64]) -> Result<f64> {
        let n = series.len();
        if n < self.config.min_samples {
            return Err(ForecastError::InsufficientData {
                required: self.config.min_samples,
                actual: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidData(
                "series contains NaN or infinite values".to_string(),
            ));
        }

        // A flat series has nothing to learn.
        if let Some(first) = series.first() {
            if series.iter().all(|v| v == first) {
                return Ok(*first);
            }
        }

        let inputs: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let mut model = self.build_model();
        model.fit(&inputs, series)?;
        let next = model.predict(n as f64)?;

        if !next.is_finite() {
            tracing::warn!("{} model produced non-finite forecast {}", model.name(), next);
            return Err(ForecastError::NonFinite(next));
        }

        tracing::debug!("{} forecast over {} samples: {:.3}", model.name(), n, next);
        Ok(next)
    }

    /// Forecast both metrics. Fails as a unit if either metric fails.
    ///
    /// # Errors
    /// Any error from [`ForecastEngine::predict_next`] on either series.
    pub fn forecast(&self, temperatures: &[f64], humidities: &[f64]) -> Result<Prediction> {
        let next_temperature = self.predict_next(temperatures)?;
        let next_humidity = self.predict_next(humidities)?;
        Ok(Prediction::new(next_temperature, next_humidity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(model: ModelChoice) -> ForecastEngine {
        ForecastEngine::new(EngineConfig {
            model,
            seed: Some(11),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_requires_min_samples() {
        let err = engine(ModelChoice::Linear)
            .predict_next(&[1.0; 9])
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 10,
                actual: 9
            }
        );
    }

    #[test]
    fn test_constant_series_predicts_constant() {
        for model in [ModelChoice::Linear, ModelChoice::Mlp] {
            for value in [21.5, -3.0, 1013.0] {
                let series = vec![value; 25];
                let next = engine(model).predict_next(&series).unwrap();
                assert!(next.is_finite());
                assert!(
                    (next - value).abs() <= 1e-2 * value.abs(),
                    "{model:?}: {next} vs {value}"
                );
            }
        }
    }

    #[test]
    fn test_ramp_extrapolates_one_step() {
        let series: Vec<f64> = (10..20).map(f64::from).collect();
        let next = engine(ModelChoice::Linear).predict_next(&series).unwrap();
        assert!((next - 20.0).abs() <= 20.0 * 1e-2, "got {next}");
    }

    #[test]
    fn test_uses_full_buffer_window() {
        let series: Vec<f64> = (0..50).map(|i| 0.5 * f64::from(i) + 60.0).collect();
        let next = engine(ModelChoice::Linear).predict_next(&series).unwrap();
        assert!((next - 85.0).abs() < 1e-6, "got {next}");
    }

    #[test]
    fn test_series_is_not_mutated() {
        let series: Vec<f64> = (0..12).map(|i| f64::from(i * i)).collect();
        let before = series.clone();
        let _ = engine(ModelChoice::Mlp).predict_next(&series);
        assert_eq!(series, before);
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut series = vec![1.0; 10];
        series[4] = f64::INFINITY;
        assert!(matches!(
            engine(ModelChoice::Linear).predict_next(&series),
            Err(ForecastError::InvalidData(_))
        ));
    }

    #[test]
    fn test_divergent_training_is_reported() {
        let engine = ForecastEngine::new(EngineConfig {
            learning_rate: Some(5.0),
            epochs: Some(5000),
            ..EngineConfig::default()
        });
        let series: Vec<f64> = (0..10).map(f64::from).collect();
        assert!(matches!(
            engine.predict_next(&series),
            Err(ForecastError::NonFinite(_))
        ));
    }

    #[test]
    fn test_forecast_sets_both_fields() {
        let temps: Vec<f64> = (10..20).map(f64::from).collect();
        let hums: Vec<f64> = (0..10).map(|i| 80.0 - f64::from(i)).collect();
        let prediction = engine(ModelChoice::Linear).forecast(&temps, &hums).unwrap();

        assert!(prediction.is_available());
        let humidity = prediction.next_humidity.unwrap();
        assert!((humidity - 70.0).abs() < 1e-6, "got {humidity}");
    }

    #[test]
    fn test_forecast_fails_as_unit() {
        let temps: Vec<f64> = (10..20).map(f64::from).collect();
        let short = vec![50.0; 3];
        assert!(engine(ModelChoice::Linear).forecast(&temps, &short).is_err());
    }

    #[test]
    fn test_prediction_defaults_to_none() {
        let p = Prediction::none();
        assert!(!p.is_available());
        assert_eq!(p.next_temperature, None);
        assert_eq!(p.next_humidity, None);

        let json = serde_json::to_string(&Prediction::new(20.0, 55.0)).unwrap();
        assert!(json.contains("next_temperature"));
    }
}
