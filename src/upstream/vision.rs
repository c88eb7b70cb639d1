//! HTTP vision service client.
//!
//! Thin wrapper that posts the image as multipart field `image`. Pure
//! parsing in `parse_vision_reply` for testability.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::info;

use super::config::UpstreamTimeouts;
use super::types::{RawDiagnosis, UpstreamError, VisionService};
use crate::state::ImageFile;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpVisionClient {
    http: reqwest::Client,
    url: String,
}

impl HttpVisionClient {
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
impl VisionService for HttpVisionClient {
    async fn analyze(&self, image: &ImageFile) -> Result<RawDiagnosis, UpstreamError> {
        let mut part = Part::bytes(image.bytes.clone()).file_name(image.name.clone());
        if let Some(mime) = image.content_type.as_deref() {
            part = part
                .mime_str(mime)
                .map_err(|e| UpstreamError::Request(e.to_string()))?;
        }
        let form = Form::new().part("image", part);

        info!(url = %self.url, bytes = image.bytes.len(), "vision: posting image");
        let response = self
            .http
            .post(&self.url)
            .multipart(form)
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

        parse_vision_reply(&text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Accepts both the bare diagnosis object and the `{ok, result: {...}}` envelope.
pub(crate) fn parse_vision_reply(json: &str) -> Result<RawDiagnosis, UpstreamError> {
    let mut value: serde_json::Value = serde_json::from_str(json).map_err(|e| UpstreamError::Parse(e.to_string()))?;

    let envelope = value
        .get_mut("result")
        .filter(|r| r.is_object())
        .map(serde_json::Value::take);
    if let Some(result) = envelope {
        value = result;
    }
    if !value.is_object() {
        return Err(UpstreamError::Parse("expected a JSON object".into()));
    }

    serde_json::from_value(value).map_err(|e| UpstreamError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "vision_test.rs"]
mod tests;
