//! Short-horizon forecasting for SkyCast
//!
//! Each metric is forecast independently: a fresh regressor is fitted to
//! `(0, 1, ..., n-1) -> series` and evaluated at index `n`. Nothing is kept
//! between calls.

pub mod engine;
pub mod error;
pub mod linear;
pub mod mlp;
pub mod regressor;

pub use engine::{EngineConfig, ForecastEngine, ModelChoice, Prediction, DEFAULT_MIN_SAMPLES};
pub use error::{ForecastError, Result};
pub use linear::LinearTrend;
pub use mlp::Mlp;
pub use regressor::{Regressor, Standardizer};
