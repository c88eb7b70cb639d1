//! Upstream types — service traits, raw reply shapes and errors.
//!
//! Provider-neutral types shared by the HTTP adapters and the in-process
//! stubs. The orchestrator only ever talks to `VisionService` and
//! `ChatService`, which keeps the real model swappable and mockable.

use serde::Deserialize;

use crate::state::{ChatTurn, ImageContext, ImageFile};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by upstream service adapters.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success HTTP status.
    #[error("status {status}: {body}")]
    Response { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl UpstreamError {
    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() { Self::Timeout } else { Self::Request(e.to_string()) }
    }
}

impl crate::error::ErrorCode for UpstreamError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::Timeout => "E_UPSTREAM_TIMEOUT",
            Self::Request(_) => "E_UPSTREAM_REQUEST",
            Self::Response { .. } => "E_UPSTREAM_RESPONSE",
            Self::Parse(_) => "E_UPSTREAM_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// RAW VISION REPLY
// =============================================================================

/// Vision service reply before normalization. Every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDiagnosis {
    #[serde(default)]
    pub plant: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    /// Kept loose: anything that is not a JSON number normalizes to 0.
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
    #[serde(default)]
    pub advice: Option<String>,
    #[serde(default, rename = "relatedImages")]
    pub related_images: Option<Vec<String>>,
}

// =============================================================================
// SERVICE TRAITS
// =============================================================================

/// Image analysis capability. Assumed stateless and idempotent.
#[async_trait::async_trait]
pub trait VisionService: Send + Sync {
    /// Analyze one image and return the raw diagnosis.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] on transport failure, non-2xx status or
    /// an unreadable body.
    async fn analyze(&self, image: &ImageFile) -> Result<RawDiagnosis, UpstreamError>;
}

/// Conversational capability. Receives the whole transcript every call.
#[async_trait::async_trait]
pub trait ChatService: Send + Sync {
    /// Produce the assistant reply text for `turns`.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] on transport failure, non-2xx status or
    /// an unreadable body.
    async fn reply(&self, turns: &[ChatTurn], context: Option<&ImageContext>) -> Result<String, UpstreamError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
