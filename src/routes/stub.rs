//! Stub vision and chat endpoints plus the health check.
//!
//! These stand in for the real model services during development: point
//! `VISION_SERVICE_URL` / `CHAT_SERVICE_URL` at them, or leave both unset
//! and the orchestrator calls the same stubs in-process.

use axum::extract::Multipart;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{ApiError, read_image_field};
use crate::services::orchestrator::OrchestratorError;
use crate::state::{ChatTurn, ImageContext};
use crate::upstream::stub::{STUB_ADVICE, STUB_CONFIDENCE, STUB_DISEASE, STUB_PLANT, StubChat};

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// `POST /api/diagnose` — multipart `image`; always answers with the mock result.
pub async fn diagnose(multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let image = read_image_field(multipart)
        .await?
        .ok_or_else(|| OrchestratorError::InvalidInput("image file required".into()))?;
    info!(name = %image.name, bytes = image.bytes.len(), "stub diagnose");

    Ok(Json(json!({
        "ok": true,
        "result": {
            "plant": STUB_PLANT,
            "disease": STUB_DISEASE,
            "confidence": STUB_CONFIDENCE,
            "advice": STUB_ADVICE,
        }
    })))
}

#[derive(Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(rename = "imageContext")]
    pub image_context: Option<ImageContext>,
}

/// `POST /api/chat` — `{messages, imageContext?}` to `{text}`.
pub async fn chat(Json(body): Json<ChatBody>) -> Json<Value> {
    let text = StubChat::compose_reply(&body.messages, body.image_context.as_ref());
    info!(turns = body.messages.len(), has_context = body.image_context.is_some(), "stub chat");
    Json(json!({ "text": text }))
}

#[cfg(test)]
#[path = "stub_test.rs"]
mod tests;
