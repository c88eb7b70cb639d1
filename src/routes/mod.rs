//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three groups share one Axum router: the stub services the browser
//! frontend talks to (`/api/diagnose`, `/api/chat`, `/api/health`), the
//! weather proxy, and the session API that drives the orchestrator. When a
//! static directory is configured it is served for every other path.

pub mod session;
pub mod stub;
pub mod weather;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::ErrorCode;
use crate::services::orchestrator::OrchestratorError;
use crate::services::weather::WeatherError;
use crate::state::{AppState, ImageFile};

/// Uploads larger than this are rejected before reaching a handler.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn app(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/health", get(stub::health))
        .route("/api/diagnose", post(stub::diagnose))
        .route("/api/chat", post(stub::chat))
        .route("/api/weather", get(weather::current))
        .route("/api/session", get(session::snapshot).delete(session::end))
        .route("/api/session/image", post(session::select_image).delete(session::clear_image))
        .route("/api/session/diagnose", post(session::diagnose))
        .route("/api/session/chat", post(session::send_turn))
        .route("/api/session/input", put(session::set_input))
        .route("/api/session/suggestions", get(session::suggestions))
        .route("/api/session/suggestions/{index}", post(session::select_suggestion))
        .route("/api/session/speech/toggle", post(session::toggle_playback))
        .route("/api/session/speech/stop", post(session::stop_speaking))
        .route("/api/session/speech/finished/{id}", post(session::utterance_finished))
        .route("/api/session/voice", put(session::set_voice))
        .route("/api/session/transcript.txt", get(session::transcript_text))
        .route("/api/session/preview/{id}", get(session::preview))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    }
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub retryable: bool,
}

/// JSON error response: `{error, code, details?, retryable}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn from_code(status: StatusCode, err: &impl ErrorCode) -> Self {
        Self {
            status,
            body: ErrorBody { error: err.to_string(), code: err.error_code(), details: None, retryable: err.retryable() },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub(crate) fn orchestrator_error_status(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        OrchestratorError::DiagnosisFailed(_) | OrchestratorError::ChatFailed(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::Superseded | OrchestratorError::SessionEnded => StatusCode::CONFLICT,
    }
}

pub(crate) fn weather_error_status(err: &WeatherError) -> StatusCode {
    match err {
        WeatherError::MissingCoordinates | WeatherError::InvalidCoordinates(_) => StatusCode::BAD_REQUEST,
        WeatherError::MissingApiKey | WeatherError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let status = orchestrator_error_status(&err);
        if status.is_server_error() {
            warn!(error = %err, code = err.error_code(), "request failed");
        }
        Self::from_code(status, &err)
    }
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        let status = weather_error_status(&err);
        let mut api = Self::from_code(status, &err);
        if let WeatherError::Upstream(inner) = &err {
            warn!(error = %inner, "weather lookup failed");
            api.body.error = "failed to fetch weather".into();
            api.body.details = Some(inner.to_string());
        }
        api
    }
}

// =============================================================================
// MULTIPART
// =============================================================================

/// Pull the `image` field out of a multipart body. Other fields are skipped;
/// `Ok(None)` when there is no `image` field at all.
pub(crate) async fn read_image_field(mut multipart: Multipart) -> Result<Option<ImageFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OrchestratorError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| OrchestratorError::InvalidInput(format!("failed to read image: {e}")))?;
        return Ok(Some(ImageFile { name, content_type, bytes: bytes.to_vec() }));
    }
    Ok(None)
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
