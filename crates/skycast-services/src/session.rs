//! Session controller: city changes, fetch tickets and retraining.
//!
//! The controller is synchronous and owns all session state. Callers obtain
//! a [`FetchTicket`] when a fetch should start, run the fetch however they
//! like, then hand the ticket back with the result via
//! [`SessionController::apply`]. A ticket from an older generation, or one
//! that is no longer the in-flight request, is discarded without touching
//! any state.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use skycast_forecast::{ForecastEngine, Prediction};
use skycast_weather::{CurrentConditions, FetchError, Reading, SampleBuffer};

use crate::error_mapping::IntoAppError;
use crate::state::SessionState;

/// Authorization to run one fetch for one session.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    request: u64,
    city: String,
    cancel: CancellationToken,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Trimmed city to fetch
    pub fn city(&self) -> &str {
        &self.city
    }

    /// Signalled when the ticket is superseded
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Outcome of [`SessionController::set_city`].
#[derive(Debug)]
pub enum CityChange {
    /// Same city as the current session; nothing happened
    Unchanged,
    /// New session that failed up front (empty city or no credential)
    Rejected,
    /// New session; run this fetch
    Fetch(FetchTicket),
}

/// Outcome of [`SessionController::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    Stale,
}

/// Read-only snapshot for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionView {
    /// Increments on every city change
    pub generation: u64,
    pub city: Option<String>,
    pub state: SessionState,
    pub conditions: Option<CurrentConditions>,
    /// Oldest first
    pub buffer: Vec<Reading>,
    pub prediction: Prediction,
    pub error_message: Option<String>,
}

impl SessionView {
    pub fn latest(&self) -> Option<&Reading> {
        self.buffer.last()
    }
}

struct InFlight {
    request: u64,
    cancel: CancellationToken,
}

pub struct SessionController {
    engine: ForecastEngine,
    generation: u64,
    next_request: u64,
    city: Option<String>,
    state: SessionState,
    buffer: SampleBuffer,
    conditions: Option<CurrentConditions>,
    prediction: Prediction,
    error_message: Option<String>,
    in_flight: Option<InFlight>,
    has_credential: bool,
}

impl SessionController {
    pub fn new(engine: ForecastEngine, buffer_capacity: usize) -> Self {
        Self {
            engine,
            generation: 0,
            next_request: 0,
            city: None,
            state: SessionState::Idle,
            buffer: SampleBuffer::new(buffer_capacity),
            conditions: None,
            prediction: Prediction::none(),
            error_message: None,
            in_flight: None,
            has_credential: true,
        }
    }

    /// Without a credential every city is rejected before any fetch.
    pub fn with_credential(mut self, present: bool) -> Self {
        self.has_credential = present;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn prediction(&self) -> Prediction {
        self.prediction
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Start a new session for `raw_city`.
    ///
    /// Cancels any in-flight fetch, resets the buffer and prediction, then
    /// either issues a ticket or fails immediately on an empty city or a
    /// missing credential.
    pub fn set_city(&mut self, raw_city: &str) -> CityChange {
        let city = raw_city.trim();
        if self.state != SessionState::Idle && self.city.as_deref() == Some(city) {
            tracing::debug!("City unchanged ({:?}), ignoring", city);
            return CityChange::Unchanged;
        }

        self.cancel_in_flight();
        self.generation += 1;
        self.city = Some(city.to_string());
        self.buffer.clear();
        self.conditions = None;
        self.prediction = Prediction::none();
        self.error_message = None;

        let rejection = if city.is_empty() {
            Some(FetchError::EmptyCity)
        } else if !self.has_credential {
            Some(FetchError::MissingCredential)
        } else {
            None
        };
        if let Some(e) = rejection {
            tracing::info!("Session {} rejected: {}", self.generation, e);
            self.state = self.state.on_fetch_failed();
            self.error_message = Some(e.into_app_error().user_message().to_string());
            return CityChange::Rejected;
        }

        tracing::info!("Session {} started for {}", self.generation, city);
        CityChange::Fetch(self.issue_ticket())
    }

    /// Fetch the current city again within the same session.
    ///
    /// Returns `None` while a fetch is in flight, before any city was set,
    /// when the current city is empty, or without a credential.
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        if !self.state.can_refresh() || !self.has_credential {
            return None;
        }
        match self.city.as_deref() {
            Some(city) if !city.is_empty() => Some(self.issue_ticket()),
            _ => None,
        }
    }

    fn issue_ticket(&mut self) -> FetchTicket {
        self.next_request += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            request: self.next_request,
            cancel: cancel.clone(),
        });
        self.state = self.state.on_fetch_started();
        FetchTicket {
            generation: self.generation,
            request: self.next_request,
            city: self.city.clone().unwrap_or_default(),
            cancel,
        }
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self
                .in_flight
                .as_ref()
                .is_some_and(|f| f.request == ticket.request)
    }

    /// Apply a fetch result. Stale tickets never change state.
    pub fn apply(
        &mut self,
        ticket: &FetchTicket,
        result: Result<CurrentConditions, FetchError>,
    ) -> Applied {
        if !self.is_current(ticket) {
            tracing::debug!(
                "Discarding stale result for {} (generation {}, request {})",
                ticket.city,
                ticket.generation,
                ticket.request
            );
            return Applied::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(conditions) => {
                self.buffer.append(conditions.reading);
                self.conditions = Some(conditions);
                self.state = self.state.on_fetch_succeeded();
                self.error_message = None;
                self.retrain();
            }
            Err(e) => {
                tracing::warn!("Weather fetch for {} failed: {}", ticket.city, e);
                self.state = self.state.on_fetch_failed();
                self.error_message = Some(e.into_app_error().user_message().to_string());
            }
        }
        Applied::Accepted
    }

    fn retrain(&mut self) {
        if self.buffer.len() < self.engine.min_samples() {
            return;
        }
        let temperatures = self.buffer.temperatures();
        let humidities = self.buffer.humidities();
        match self.engine.forecast(&temperatures, &humidities) {
            Ok(prediction) => self.prediction = prediction,
            Err(e) => {
                // Previous prediction stays; the session does not fail
                let err = e.into_app_error();
                tracing::warn!("{}: {}", err.user_message(), err);
            }
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            flight.cancel.cancel();
        }
    }

    /// Cancel outstanding work; used when the owning service stops.
    pub fn shutdown(&mut self) {
        self.cancel_in_flight();
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            generation: self.generation,
            city: self.city.clone(),
            state: self.state,
            conditions: self.conditions.clone(),
            buffer: self.buffer.snapshot(),
            prediction: self.prediction,
            error_message: self.error_message.clone(),
        }
    }
}
