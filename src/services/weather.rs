//! Weather lookup — OpenWeather current conditions for the side panel.
//!
//! The upstream payload is reduced to `{location, coords, weather, main,
//! wind, dt}` plus a display emoji. Parsing is pure (`parse_weather_reply`)
//! so it can be tested without the network.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::upstream::config::UpstreamTimeouts;
use crate::upstream::types::UpstreamError;

pub const DEFAULT_OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

// =============================================================================
// CONFIG + ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherConfig {
    pub api_key: String,
    pub base_url: String,
}

impl WeatherConfig {
    /// `None` when `OPENWEATHER_API_KEY` is unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENWEATHER_API_KEY").ok()?.trim().to_string();
        if api_key.is_empty() {
            return None;
        }
        let base_url = std::env::var("OPENWEATHER_BASE_URL")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_OPENWEATHER_BASE_URL.to_string());
        Some(Self { api_key, base_url })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("OPENWEATHER_API_KEY not set on server")]
    MissingApiKey,
    #[error("lat and lon required")]
    MissingCoordinates,
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("failed to fetch weather: {0}")]
    Upstream(#[from] UpstreamError),
}

impl crate::error::ErrorCode for WeatherError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "E_WEATHER_NOT_CONFIGURED",
            Self::MissingCoordinates | Self::InvalidCoordinates(_) => "E_INVALID_INPUT",
            Self::Upstream(_) => "E_WEATHER_FAILED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Upstream(e) if crate::error::ErrorCode::retryable(e))
    }
}

/// Parse `lat`/`lon` query values into a checked coordinate pair.
///
/// # Errors
///
/// [`WeatherError::MissingCoordinates`] when either is absent or blank,
/// [`WeatherError::InvalidCoordinates`] when not a number or out of range.
pub fn parse_coordinates(lat: Option<&str>, lon: Option<&str>) -> Result<(f64, f64), WeatherError> {
    let (Some(lat), Some(lon)) = (lat.map(str::trim), lon.map(str::trim)) else {
        return Err(WeatherError::MissingCoordinates);
    };
    if lat.is_empty() || lon.is_empty() {
        return Err(WeatherError::MissingCoordinates);
    }
    let lat: f64 = lat.parse().map_err(|_| WeatherError::InvalidCoordinates(format!("lat '{lat}'")))?;
    let lon: f64 = lon.parse().map_err(|_| WeatherError::InvalidCoordinates(format!("lon '{lon}'")))?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(WeatherError::InvalidCoordinates(format!("lat {lat} out of range")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(WeatherError::InvalidCoordinates(format!("lon {lon} out of range")));
    }
    Ok((lat, lon))
}

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
}

/// Temperature readings; fields other than `temp` pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    #[serde(default)]
    pub temp: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub location: Option<String>,
    pub coords: Option<Coords>,
    pub weather: Condition,
    pub main: Readings,
    pub wind: Wind,
    pub dt: Option<i64>,
    pub emoji: &'static str,
}

#[derive(Deserialize)]
struct OpenWeatherReply {
    name: Option<String>,
    coord: Option<Coords>,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    main: Readings,
    #[serde(default)]
    wind: Wind,
    dt: Option<i64>,
}

/// Icon for a condition: rain, storm and snow by id range or name, then
/// clear (800), cloudy (>800), else a mild default.
#[must_use]
pub fn weather_emoji(condition: &Condition) -> &'static str {
    let id = condition.id;
    let main = condition.main.to_lowercase();
    if main.contains("rain") || (500..600).contains(&id) {
        "🌧️"
    } else if main.contains("storm") || (200..300).contains(&id) {
        "⛈️"
    } else if main.contains("snow") || (600..700).contains(&id) {
        "❄️"
    } else if id == 800 {
        "☀️"
    } else if id > 800 {
        "⛅"
    } else {
        "🌤️"
    }
}

/// Reduce an OpenWeather `/weather` body to a [`WeatherReport`].
///
/// # Errors
///
/// [`UpstreamError::Parse`] if the body is not the expected JSON shape.
pub fn parse_weather_reply(text: &str) -> Result<WeatherReport, UpstreamError> {
    let raw: OpenWeatherReply = serde_json::from_str(text).map_err(|e| UpstreamError::Parse(e.to_string()))?;
    let weather = raw.weather.into_iter().next().unwrap_or_default();
    let emoji = weather_emoji(&weather);
    Ok(WeatherReport { location: raw.name, coords: raw.coord, weather, main: raw.main, wind: raw.wind, dt: raw.dt, emoji })
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct WeatherClient {
    http: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherClient {
    /// # Errors
    ///
    /// Returns [`UpstreamError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: WeatherConfig, timeouts: UpstreamTimeouts) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| UpstreamError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Current conditions at `(lat, lon)` in metric units.
    ///
    /// # Errors
    ///
    /// Transport, status or parse failures as [`UpstreamError`].
    pub async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherReport, UpstreamError> {
        let url = format!("{}/weather", self.config.base_url);
        let lat_s = lat.to_string();
        let lon_s = lon.to_string();
        info!(lat, lon, "weather: fetching");

        let response = self
            .http
            .get(&url)
            .query(&[("lat", lat_s.as_str()), ("lon", lon_s.as_str()), ("appid", self.config.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(&e))?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "weather: upstream error");
            return Err(UpstreamError::Response { status: status.as_u16(), body: text });
        }

        let report = parse_weather_reply(&text)?;
        info!(location = ?report.location, condition = %report.weather.main, "weather: ok");
        Ok(report)
    }
}

#[cfg(test)]
#[path = "weather_test.rs"]
mod tests;
