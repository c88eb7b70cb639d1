//! Upstream service configuration parsed from environment variables.

use super::types::UpstreamError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Vision endpoint; `None` selects the in-process stub.
    pub vision_url: Option<String>,
    /// Chat endpoint; `None` selects the in-process stub.
    pub chat_url: Option<String>,
    pub timeouts: UpstreamTimeouts,
}

impl UpstreamConfig {
    /// Build typed upstream config from environment variables.
    ///
    /// Optional:
    /// - `VISION_SERVICE_URL`: vision endpoint (stub when unset)
    /// - `CHAT_SERVICE_URL`: chat endpoint (stub when unset)
    /// - `UPSTREAM_REQUEST_TIMEOUT_SECS`: default 120
    /// - `UPSTREAM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::ConfigParse`] if a URL is not http(s).
    pub fn from_env() -> Result<Self, UpstreamError> {
        let vision_url = parse_url("VISION_SERVICE_URL", std::env::var("VISION_SERVICE_URL").ok())?;
        let chat_url = parse_url("CHAT_SERVICE_URL", std::env::var("CHAT_SERVICE_URL").ok())?;
        let timeouts = UpstreamTimeouts {
            request_secs: env_parse_u64("UPSTREAM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("UPSTREAM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { vision_url, chat_url, timeouts })
    }
}

pub(crate) fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_url(key: &str, raw: Option<String>) -> Result<Option<String>, UpstreamError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(UpstreamError::ConfigParse(format!("{key} must be an http(s) URL, got '{trimmed}'")));
    }
    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
