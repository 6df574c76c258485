//! Centralized error types for the SkyCast application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    ///
    /// These messages are designed to be actionable and non-technical.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Weather(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Storage(_) => "Saved settings could not be read or written.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Weather pipeline errors as seen by the presentation layer.
///
/// Transport, HTTP status and payload problems all collapse into
/// `Unavailable`; the detail string is for logs only.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("No city entered")]
    EmptyCity,

    #[error("Weather API key is not configured")]
    MissingApiKey,

    #[error("Live weather unavailable: {0}")]
    Unavailable(String),

    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::EmptyCity => "Please enter a city.",
            WeatherError::MissingApiKey => {
                "Weather API key is missing. Set OWM_API_KEY or weather.api_key in the config."
            }
            WeatherError::Unavailable(_) => "Unable to load live weather. Please try again.",
            WeatherError::ForecastUnavailable(_) => "Forecast not available yet.",
        }
    }
}
