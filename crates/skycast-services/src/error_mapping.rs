//! Maps pipeline errors to skycast_core::AppError for consistent user-facing messages.
//!
//! Transport, status and payload failures intentionally share one message;
//! the detail survives in the error's Display output for logs.

use skycast_core::{AppError, WeatherError};
use skycast_forecast::ForecastError;
use skycast_weather::FetchError;

use crate::store::StoreError;

/// Extension trait for converting crate-external errors to AppError.
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

impl IntoAppError for FetchError {
    fn into_app_error(self) -> AppError {
        let weather = match self {
            FetchError::EmptyCity => WeatherError::EmptyCity,
            FetchError::MissingCredential => WeatherError::MissingApiKey,
            FetchError::ApiError(status) => WeatherError::Unavailable(format!("HTTP {}", status)),
            FetchError::TransportError(e) => WeatherError::Unavailable(e.to_string()),
            FetchError::ParseError(msg) => WeatherError::Unavailable(format!("bad payload: {}", msg)),
            FetchError::Cancelled => WeatherError::Unavailable("request superseded".to_string()),
        };
        AppError::Weather(weather)
    }
}

impl IntoAppError for ForecastError {
    fn into_app_error(self) -> AppError {
        AppError::Weather(WeatherError::ForecastUnavailable(self.to_string()))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Storage(e.to_string())
    }
}
