use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::types::{CurrentConditions, CurrentWeatherResponse, FetchError, Reading};

/// Anything that can produce current conditions for a city.
///
/// The cancellation token is advisory: implementations may skip work that
/// has not started yet, but callers decide whether a finished result is
/// still wanted.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<CurrentConditions, FetchError>;
}

/// HTTP client for an OpenWeatherMap-compatible current-weather endpoint
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    units: String,
}

impl WeatherProvider {
    /// Build a provider. `timeout` of `None` lets requests wait indefinitely.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            units: "metric".to_string(),
        })
    }

    /// Override the unit system sent as `units=`
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch current conditions for `city`.
    ///
    /// The city is trimmed; empty input and a missing credential fail before
    /// any request is made.
    #[instrument(skip(self, cancel), level = "info")]
    pub async fn fetch_conditions(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<CurrentConditions, FetchError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(FetchError::EmptyCity);
        }
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingCredential)?;

        if cancel.is_cancelled() {
            tracing::debug!("Skipping weather request for {}: already superseded", city);
            return Err(FetchError::Cancelled);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", city), ("appid", api_key), ("units", self.units.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Weather API returned status {} for {}", status, city);
            return Err(FetchError::ApiError(status.as_u16()));
        }

        let body = response.text().await?;
        let payload: CurrentWeatherResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::ParseError(e.to_string()))?;

        if cancel.is_cancelled() {
            tracing::debug!("Weather for {} arrived after its session was superseded", city);
        }

        Ok(payload.into_conditions(Utc::now()))
    }

    /// Fetch only the numeric reading for `city`
    pub async fn fetch_reading(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<Reading, FetchError> {
        self.fetch_conditions(city, cancel)
            .await
            .map(|conditions| conditions.reading)
    }
}

#[async_trait]
impl WeatherSource for WeatherProvider {
    async fn fetch(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<CurrentConditions, FetchError> {
        self.fetch_conditions(city, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_city_rejected_before_request() {
        // Unroutable endpoint: any request would fail as a transport error.
        let provider = WeatherProvider::new("http://127.0.0.1:9", Some("key".into()), None).unwrap();
        let err = provider
            .fetch_conditions("   ", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyCity));
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_before_request() {
        let provider = WeatherProvider::new("http://127.0.0.1:9", None, None).unwrap();
        assert!(!provider.has_credential());
        let err = provider
            .fetch_conditions("London", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingCredential));
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let provider = WeatherProvider::new("http://127.0.0.1:9", Some("  ".into()), None).unwrap();
        assert!(!provider.has_credential());
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_request() {
        let provider = WeatherProvider::new("http://127.0.0.1:9", Some("key".into()), None).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = provider.fetch_conditions("London", &token).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }
}
