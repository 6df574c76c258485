//! Wires configuration into a running session.

use std::sync::Arc;
use std::time::Duration;

use skycast_core::{AppError, Config, ConfigError, ForecastConfig, ModelKind, WeatherConfig};
use skycast_forecast::{EngineConfig, ForecastEngine, ModelChoice};
use skycast_weather::WeatherProvider;

use crate::service::{SessionHandle, SessionService};
use crate::session::SessionController;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};

pub fn engine_config(config: &ForecastConfig) -> EngineConfig {
    EngineConfig {
        model: match config.model {
            ModelKind::Linear => ModelChoice::Linear,
            ModelKind::Mlp => ModelChoice::Mlp,
        },
        min_samples: config.min_samples,
        epochs: config.epochs,
        learning_rate: config.learning_rate,
        seed: config.seed,
    }
}

/// Build the HTTP fetcher. A missing API key is not an error here; fetches
/// fail fast instead so the session can report it.
///
/// # Errors
/// `ConfigError::Invalid` if the HTTP client cannot be constructed.
pub fn build_provider(config: &WeatherConfig) -> Result<WeatherProvider, AppError> {
    let timeout = config.request_timeout_secs.map(Duration::from_secs);
    let provider = WeatherProvider::new(config.endpoint.clone(), config.api_key(), timeout)
        .map_err(|e| {
            tracing::error!("Failed to build weather client: {}", e);
            AppError::Config(ConfigError::Invalid(e.to_string()))
        })?
        .with_units(config.units.clone());

    if !provider.has_credential() {
        tracing::warn!("No weather API key configured; fetches will fail");
    }
    Ok(provider)
}

pub fn build_controller(config: &Config) -> SessionController {
    let engine = ForecastEngine::new(engine_config(&config.forecast));
    SessionController::new(engine, config.forecast.buffer_capacity)
        .with_credential(config.weather.api_key().is_some())
}

/// File store under the data directory, or an in-memory one if it cannot be opened.
pub fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    match JsonFileStore::open(config.data_dir()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            let err: AppError = e.into();
            tracing::warn!("{} Falling back to in-memory settings: {}", err.user_message(), err);
            Arc::new(MemoryStore::new())
        }
    }
}

/// Start a session service from configuration.
///
/// # Errors
/// Any error from [`build_provider`].
pub fn start(config: &Config) -> Result<SessionHandle, AppError> {
    let provider = build_provider(&config.weather)?;
    let handle = SessionService::new(build_controller(config), Arc::new(provider))
        .with_store(open_store(config))
        .with_refresh_interval(Duration::from_secs(config.weather.refresh_seconds))
        .spawn();

    tracing::info!(
        "Session service started (model: {:?}, min samples: {})",
        config.forecast.model,
        config.forecast.min_samples
    );
    Ok(handle)
}
