use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable consulted when no API key is set in the config file.
pub const API_KEY_ENV: &str = "OWM_API_KEY";

/// Default OpenWeatherMap current-conditions endpoint.
pub const DEFAULT_WEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Live weather feed settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Forecast model settings
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Key-value storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Current-conditions endpoint (OpenWeatherMap compatible)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API credential. Falls back to the `OWM_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Unit system requested from the API
    #[serde(default = "default_units")]
    pub units: String,

    /// Optional request timeout. Unset means requests may wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Automatic refresh of the current city, in seconds (0 = off)
    #[serde(default)]
    pub refresh_seconds: u64,
}

fn default_endpoint() -> String {
    DEFAULT_WEATHER_ENDPOINT.to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            units: default_units(),
            request_timeout_secs: None,
            refresh_seconds: 0,
        }
    }
}

impl WeatherConfig {
    /// The credential to use: config file first, then the environment.
    /// Blank values count as missing.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(API_KEY_ENV)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

/// Regression model used for the short-horizon forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Linear,
    Mlp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Which regressor to train
    #[serde(default)]
    pub model: ModelKind,

    /// Samples required before the first prediction
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Rolling buffer capacity per session
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Training iterations; unset uses the model's own default
    #[serde(default)]
    pub epochs: Option<usize>,

    /// Optimizer step size; unset uses the model's own default
    #[serde(default)]
    pub learning_rate: Option<f64>,

    /// Seed for weight initialization (MLP only). Unset draws from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_samples() -> usize {
    10
}

fn default_buffer_capacity() -> usize {
    50
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            min_samples: default_min_samples(),
            buffer_capacity: default_buffer_capacity(),
            epochs: None,
            learning_rate: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for persisted key-value entries (last city, tasks).
    /// Defaults to the config directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            forecast: ForecastConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", config_path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.endpoint, "weather.endpoint", &mut result);

        if self.weather.api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured and {} is unset - live weather will be unavailable", API_KEY_ENV),
            );
        }

        if !matches!(self.weather.units.as_str(), "metric" | "imperial" | "standard") {
            result.add_error(
                "weather.units",
                format!("Unknown unit system: {}", self.weather.units),
            );
        }

        if self.weather.request_timeout_secs == Some(0) {
            result.add_error(
                "weather.request_timeout_secs",
                "Timeout must be greater than 0 (remove it to disable)",
            );
        }

        let forecast = &self.forecast;
        if forecast.min_samples < 2 {
            result.add_error("forecast.min_samples", "At least 2 samples are needed to fit a trend");
        }
        if forecast.buffer_capacity == 0 {
            result.add_error("forecast.buffer_capacity", "Buffer capacity must be greater than 0");
        } else if forecast.min_samples > forecast.buffer_capacity {
            result.add_error(
                "forecast.min_samples",
                format!(
                    "min_samples ({}) exceeds buffer_capacity ({}); no forecast would ever be made",
                    forecast.min_samples, forecast.buffer_capacity
                ),
            );
        }
        if forecast.epochs == Some(0) {
            result.add_error("forecast.epochs", "Epochs must be greater than 0");
        }
        if let Some(lr) = forecast.learning_rate {
            if !lr.is_finite() || lr <= 0.0 {
                result.add_error("forecast.learning_rate", "Learning rate must be a positive number");
            }
        }

        if let Some(dir) = &self.storage.data_dir {
            if dir.exists() && !dir.is_dir() {
                result.add_error(
                    "storage.data_dir",
                    format!("Path is not a directory: {}", dir.display()),
                );
            }
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Directory used by the key-value store
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.clone())
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_config() -> Config {
        let mut config = Config::default();
        config.weather.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn test_valid_default_config() {
        let config = keyed_config();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = keyed_config();
        config.weather.endpoint = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.endpoint"));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = keyed_config();
        config.weather.endpoint = "ftp://api.example.com/weather".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let mut config = Config::default();
        config.weather.api_key = Some("   ".to_string());
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(config.weather.api_key().is_none());
            assert!(config.validate().warnings.iter().any(|w| w.field == "weather.api_key"));
        }
    }

    #[test]
    fn test_min_samples_above_capacity() {
        let mut config = keyed_config();
        config.forecast.min_samples = 60;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "forecast.min_samples"));
    }

    #[test]
    fn test_non_positive_learning_rate() {
        let mut config = keyed_config();
        config.forecast.learning_rate = Some(0.0);
        assert!(!config.validate().is_valid());
        config.forecast.learning_rate = Some(f64::NAN);
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_unknown_units() {
        let mut config = keyed_config();
        config.weather.units = "kelvinish".to_string();
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let toml = r#"
            config_dir = "/tmp/skycast"

            [forecast]
            model = "mlp"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.forecast.model, ModelKind::Mlp);
        assert_eq!(config.forecast.min_samples, 10);
        assert_eq!(config.forecast.buffer_capacity, 50);
        assert_eq!(config.weather.endpoint, DEFAULT_WEATHER_ENDPOINT);
        assert_eq!(config.weather.refresh_seconds, 0);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.weather.endpoint, created.weather.endpoint);
        assert_eq!(reloaded.forecast.min_samples, created.forecast.min_samples);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[forecast\nmodel = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(config_err, ConfigError::ParseError(_)));
        assert_eq!(
            config_err.user_message(),
            "Configuration file is malformed. Check your settings."
        );
    }

    #[test]
    fn test_data_dir_defaults_to_config_dir() {
        let mut config = Config::default();
        assert_eq!(config.data_dir(), config.config_dir);
        config.storage.data_dir = Some(PathBuf::from("/var/lib/skycast"));
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/skycast"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
