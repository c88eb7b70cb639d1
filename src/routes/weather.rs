//! Weather proxy route.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use super::ApiError;
use crate::services::weather::{WeatherError, WeatherReport, parse_coordinates};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WeatherQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// `GET /api/weather?lat=..&lon=..`
pub async fn current(State(state): State<AppState>, Query(query): Query<WeatherQuery>) -> Result<Json<WeatherReport>, ApiError> {
    let (lat, lon) = parse_coordinates(query.lat.as_deref(), query.lon.as_deref())?;
    let client = state.weather.as_ref().ok_or(WeatherError::MissingApiKey)?;
    let report = client.fetch(lat, lon).await.map_err(WeatherError::from)?;
    Ok(Json(report))
}
