//! Session API — HTTP surface of the orchestrator.
//!
//! One process hosts one interaction stream, so there is no session id in
//! the paths. Handlers translate JSON/multipart to orchestrator calls and
//! nothing else.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ApiError, read_image_field};
use crate::services::orchestrator::OrchestratorError;
use crate::services::session::SessionSnapshot;
use crate::state::{AppState, ChatTurn, Diagnosis};

#[derive(Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub suggestions: Vec<String>,
}

#[derive(Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize)]
pub struct VoiceBody {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct TurnResponse {
    /// `None` when the input was blank and nothing was sent.
    pub reply: Option<String>,
    pub transcript: Vec<ChatTurn>,
}

/// `GET /api/session`
pub async fn snapshot(State(state): State<AppState>) -> Json<SessionView> {
    Json(SessionView { session: state.orchestrator.snapshot(), suggestions: state.suggestions.current_suggestions() })
}

/// `DELETE /api/session` — stop speech and forget everything.
pub async fn end(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.end_session();
    StatusCode::NO_CONTENT
}

// =============================================================================
// IMAGE + DIAGNOSIS
// =============================================================================

/// `POST /api/session/image` — multipart `image`.
pub async fn select_image(State(state): State<AppState>, multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let file = read_image_field(multipart).await?;
    let id = state.orchestrator.select_image(file)?;
    Ok(Json(json!({ "previewId": id, "previewUrl": format!("/api/session/preview/{id}") })))
}

/// `DELETE /api/session/image`
pub async fn clear_image(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.clear_image();
    StatusCode::NO_CONTENT
}

/// `GET /api/session/preview/{id}`
pub async fn preview(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, StatusCode> {
    let image = state.orchestrator.preview(id).ok_or(StatusCode::NOT_FOUND)?;
    let content_type = image
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    Ok(([(CONTENT_TYPE, content_type)], image.bytes.clone()).into_response())
}

/// `POST /api/session/diagnose`
pub async fn diagnose(State(state): State<AppState>) -> Result<Json<Diagnosis>, ApiError> {
    Ok(Json(state.orchestrator.diagnose_selected().await?))
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// `POST /api/session/chat` — `{text}`.
pub async fn send_turn(State(state): State<AppState>, Json(body): Json<TextBody>) -> Result<Json<TurnResponse>, ApiError> {
    let reply = state.orchestrator.send_turn(&body.text).await?;
    Ok(Json(TurnResponse { reply, transcript: state.orchestrator.transcript() }))
}

/// `PUT /api/session/input` — replace the chat input draft.
pub async fn set_input(State(state): State<AppState>, Json(body): Json<TextBody>) -> StatusCode {
    state.orchestrator.set_chat_input(&body.text);
    StatusCode::NO_CONTENT
}

/// `GET /api/session/transcript.txt` — plain-text copy of the chat.
pub async fn transcript_text(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], state.orchestrator.copy_transcript())
}

// =============================================================================
// SUGGESTIONS
// =============================================================================

/// `GET /api/session/suggestions`
pub async fn suggestions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.suggestions.current_suggestions())
}

/// `POST /api/session/suggestions/{index}` — copy the visible suggestion at
/// `index` into the chat input.
pub async fn select_suggestion(State(state): State<AppState>, Path(index): Path<usize>) -> Result<Json<Value>, ApiError> {
    let text = state
        .suggestions
        .visible_at(index)
        .ok_or_else(|| OrchestratorError::InvalidInput(format!("no suggestion at position {index}")))?;
    state.orchestrator.select_suggestion(&text);
    Ok(Json(json!({ "chatInput": text })))
}

// =============================================================================
// SPEECH
// =============================================================================

/// `POST /api/session/speech/toggle` — stop if speaking, else replay the last turn.
pub async fn toggle_playback(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "speaking": state.orchestrator.toggle_playback() }))
}

/// `POST /api/session/speech/stop`
pub async fn stop_speaking(State(state): State<AppState>) -> Json<Value> {
    state.orchestrator.stop_speaking();
    Json(json!({ "speaking": false }))
}

/// `POST /api/session/speech/finished/{id}` — the client finished playing
/// utterance `id`.
pub async fn utterance_finished(State(state): State<AppState>, Path(id): Path<Uuid>) -> Json<Value> {
    let ended = state.orchestrator.utterance_finished(id);
    Json(json!({ "ended": ended, "speaking": state.orchestrator.is_speaking() }))
}

/// `PUT /api/session/voice` — `{enabled}`.
pub async fn set_voice(State(state): State<AppState>, Json(body): Json<VoiceBody>) -> Json<Value> {
    state.orchestrator.set_voice_enabled(body.enabled);
    Json(json!({ "voiceEnabled": body.enabled }))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
