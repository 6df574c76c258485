//! Live weather feed for SkyCast
//!
//! Fetches current conditions for a city from an OpenWeatherMap-compatible
//! endpoint and keeps a bounded, arrival-ordered series of readings.

pub mod buffer;
pub mod provider;
pub mod types;

pub use buffer::{SampleBuffer, DEFAULT_CAPACITY};
pub use provider::{WeatherProvider, WeatherSource};
pub use types::*;
