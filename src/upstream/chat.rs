//! HTTP chat service client.
//!
//! Posts `{messages, imageContext}` and accepts the reply in any of the
//! shapes chat backends commonly return: `{text}`, `{assistant: {text}}`,
//! `{assistant: "..."}`, a bare JSON string, or plain text.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::config::UpstreamTimeouts;
use super::types::{ChatService, UpstreamError};
use crate::state::{ChatTurn, ImageContext};

/// Reply text used when the service answers without any text.
pub const EMPTY_REPLY_TEXT: &str = "No answer";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpChatClient {
    http: reqwest::Client,
    url: String,
}

impl HttpChatClient {
    /// # Errors
    ///
    /// Returns [`UpstreamError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(url: String, timeouts: UpstreamTimeouts) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| UpstreamError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, url })
    }
}

#[async_trait::async_trait]
impl ChatService for HttpChatClient {
    async fn reply(&self, turns: &[ChatTurn], context: Option<&ImageContext>) -> Result<String, UpstreamError> {
        let body = ChatRequest { messages: turns, image_context: context };

        info!(url = %self.url, turns = turns.len(), has_context = context.is_some(), "chat: posting transcript");
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(UpstreamError::Response { status: status.as_u16(), body: text });
        }

        Ok(parse_chat_reply(&text))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub messages: &'a [ChatTurn],
    #[serde(rename = "imageContext", skip_serializing_if = "Option::is_none")]
    pub image_context: Option<&'a ImageContext>,
}

// =============================================================================
// PARSING
// =============================================================================

pub(crate) fn parse_chat_reply(body: &str) -> String {
    let text = match serde_json::from_str::<Value>(body) {
        Ok(value) => extract_text(&value).unwrap_or_default(),
        Err(_) => body.trim().to_string(),
    };
    if text.trim().is_empty() { EMPTY_REPLY_TEXT.to_string() } else { text }
}

fn extract_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| map.get("assistant").and_then(extract_text)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
