use super::*;
use crate::services::orchestrator::Action;
use crate::upstream::types::UpstreamError;

#[test]
fn orchestrator_status_mapping() {
    assert_eq!(orchestrator_error_status(&OrchestratorError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(
        orchestrator_error_status(&OrchestratorError::UpstreamTimeout { action: Action::Chat, secs: 120 }),
        StatusCode::GATEWAY_TIMEOUT
    );
    assert_eq!(orchestrator_error_status(&OrchestratorError::DiagnosisFailed("x".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(orchestrator_error_status(&OrchestratorError::ChatFailed("x".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(orchestrator_error_status(&OrchestratorError::Superseded), StatusCode::CONFLICT);
    assert_eq!(orchestrator_error_status(&OrchestratorError::SessionEnded), StatusCode::CONFLICT);
}

#[test]
fn weather_status_mapping() {
    assert_eq!(weather_error_status(&WeatherError::MissingCoordinates), StatusCode::BAD_REQUEST);
    assert_eq!(weather_error_status(&WeatherError::InvalidCoordinates("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(weather_error_status(&WeatherError::MissingApiKey), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(weather_error_status(&WeatherError::Upstream(UpstreamError::Timeout)), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn api_error_body_from_orchestrator() {
    let api = ApiError::from(OrchestratorError::UpstreamTimeout { action: Action::Diagnosis, secs: 120 });
    assert_eq!(api.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(api.body.code, "E_UPSTREAM_TIMEOUT");
    assert_eq!(api.body.error, "diagnosis timed out after 120s");
    assert!(api.body.retryable);
    assert!(api.body.details.is_none());
}

#[test]
fn api_error_body_for_weather_upstream_carries_details() {
    let api = ApiError::from(WeatherError::Upstream(UpstreamError::Response { status: 401, body: "bad key".into() }));
    assert_eq!(api.body.error, "failed to fetch weather");
    assert_eq!(api.body.details.as_deref(), Some("status 401: bad key"));
    assert_eq!(api.body.code, "E_WEATHER_FAILED");

    let json = serde_json::to_value(&api.body).unwrap();
    assert_eq!(json["details"], "status 401: bad key");
}

#[test]
fn details_omitted_when_absent() {
    let api = ApiError::from(WeatherError::MissingApiKey);
    let json = serde_json::to_value(&api.body).unwrap();
    assert!(json.get("details").is_none());
    assert_eq!(json["error"], "OPENWEATHER_API_KEY not set on server");
}

#[tokio::test]
async fn weather_route_without_key_is_500() {
    use test_helpers::{empty_request, send_json};

    let app = app(crate::state::test_helpers::test_app_state(), None);
    let (status, body) = send_json(&app, empty_request("GET", "/api/weather?lat=1&lon=2")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "E_WEATHER_NOT_CONFIGURED");
}

#[tokio::test]
async fn weather_route_without_coordinates_is_400() {
    use test_helpers::{empty_request, send_json};

    let app = app(crate::state::test_helpers::test_app_state(), None);
    let (status, body) = send_json(&app, empty_request("GET", "/api/weather?lat=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "lat and lon required");
}
