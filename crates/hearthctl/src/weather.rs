//! Current outdoor conditions.
//!
//! The HVAC mode selector and the wake transition both need the outdoor
//! temperature. Both treat a failed lookup as recoverable, so callers get a
//! `Result` and pick their own fallback.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::WeatherConfig;

/// Current weather at the configured location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherState {
    pub temperature_f: f64,
    pub condition: String,
    pub humidity: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("weather location is not configured")]
    NotConfigured,

    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Anything that can report the current outdoor weather
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_weather(&self) -> Result<WeatherState, WeatherError>;
}

/// Open-Meteo forecast API client (no API key required)
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: Option<f64>,
    weather_code: Option<u8>,
}

impl OpenMeteoClient {
    pub fn new(
        base_url: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            latitude,
            longitude,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn current_weather(&self) -> Result<WeatherState, WeatherError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let response: ForecastResponse = self
            .client
            .get(&url)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code".to_string(),
                ),
                ("temperature_unit", "fahrenheit".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let current = response.current;
        let state = WeatherState {
            temperature_f: current.temperature_2m,
            condition: describe_weather_code(current.weather_code.unwrap_or(0)).to_string(),
            humidity: current.relative_humidity_2m,
        };
        debug!(
            "Current weather: {:.1}°F, {}",
            state.temperature_f, state.condition
        );
        Ok(state)
    }
}

/// Stand-in used when no location is configured; every lookup fails so
/// callers fall back to their configured defaults.
pub struct UnconfiguredWeather;

#[async_trait]
impl WeatherSource for UnconfiguredWeather {
    async fn current_weather(&self) -> Result<WeatherState, WeatherError> {
        Err(WeatherError::NotConfigured)
    }
}

/// Build the weather source described by the config
pub fn from_config(config: &WeatherConfig) -> Result<Box<dyn WeatherSource>, WeatherError> {
    match (config.latitude, config.longitude) {
        (Some(latitude), Some(longitude)) => Ok(Box::new(OpenMeteoClient::new(
            config.base_url.clone(),
            latitude,
            longitude,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Box::new(UnconfiguredWeather)),
    }
}

/// WMO weather interpretation code to a short description
fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "Clear",
        1 => "Mostly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 | 77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}
