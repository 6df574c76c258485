//! Linear trend regressor trained by full-batch gradient descent.
//!
//! Inputs and targets are standardized before training, which makes the
//! squared-error surface isotropic; with the default step size every epoch
//! shrinks the residual parameter error by a constant factor.

use crate::error::{ForecastError, Result};
use crate::regressor::{validate_training_data, Regressor, Standardizer};

pub const DEFAULT_EPOCHS: usize = 500;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct LinearTrend {
    epochs: usize,
    learning_rate: f64,
    fitted: Option<Fitted>,
}

#[derive(Debug, Clone, Copy)]
struct Fitted {
    x_scale: Standardizer,
    y_scale: Standardizer,
    weight: f64,
    bias: f64,
}

impl LinearTrend {
    pub fn new(epochs: usize, learning_rate: f64) -> Self {
        Self {
            epochs,
            learning_rate,
            fitted: None,
        }
    }
}

impl Default for LinearTrend {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE)
    }
}

impl Regressor for LinearTrend {
    fn fit(&mut self, inputs: &[f64], targets: &[f64]) -> Result<()> {
        validate_training_data(inputs, targets)?;

        let x_scale = Standardizer::fit(inputs);
        let y_scale = Standardizer::fit(targets);
        let xs = x_scale.apply_all(inputs);
        let ys = y_scale.apply_all(targets);
        let n = xs.len() as f64;

        let mut weight = 0.0_f64;
        let mut bias = 0.0_f64;
        for _ in 0..self.epochs {
            let mut grad_w = 0.0_f64;
            let mut grad_b = 0.0_f64;
            for (x, y) in xs.iter().zip(&ys) {
                let residual = weight * x + bias - y;
                grad_w += residual * x;
                grad_b += residual;
            }
            weight -= self.learning_rate * 2.0 * grad_w / n;
            bias -= self.learning_rate * 2.0 * grad_b / n;
        }

        self.fitted = Some(Fitted {
            x_scale,
            y_scale,
            weight,
            bias,
        });
        Ok(())
    }

    fn predict(&self, x: f64) -> Result<f64> {
        let fitted = self.fitted.ok_or(ForecastError::NotFitted)?;
        let z = fitted.weight * fitted.x_scale.apply(x) + fitted.bias;
        Ok(fitted.y_scale.invert(z))
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
