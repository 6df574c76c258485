use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed weather sample.
///
/// `timestamp` is the client's wall-clock time when the response was
/// accepted, not the API's observation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, temperature: f64, humidity: f64, pressure: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            pressure,
        }
    }
}

/// A reading plus the descriptive fields of the same response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Place name as resolved by the API (e.g. "London")
    pub place: String,
    /// First condition description, e.g. "light rain"
    pub description: Option<String>,
    pub reading: Reading,
}

/// Current-weather payload (OpenWeatherMap `/data/2.5/weather` shape)
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeatherResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather: Vec<WeatherDescription>,
    pub main: MainMeasurements,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherDescription {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainMeasurements {
    pub temp: f64,
    pub humidity: f64,
    pub pressure: f64,
}

impl CurrentWeatherResponse {
    /// Convert into domain conditions stamped with `observed_at`
    pub fn into_conditions(self, observed_at: DateTime<Utc>) -> CurrentConditions {
        CurrentConditions {
            place: self.name,
            description: self.weather.into_iter().next().map(|w| w.description),
            reading: Reading::new(
                observed_at,
                self.main.temp,
                self.main.humidity,
                self.main.pressure,
            ),
        }
    }
}

/// Weather fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("City name is empty")]
    EmptyCity,
    #[error("Weather API key is not configured")]
    MissingCredential,
    #[error("Weather API returned HTTP {0}")]
    ApiError(u16),
    /// The request URL is stripped; it carries the API key
    #[error("Transport error: {0}")]
    TransportError(reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Request superseded before it was sent")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::TransportError(e.without_url())
    }
}
