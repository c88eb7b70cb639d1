//! Application configuration — typed view of the process environment.
//!
//! DESIGN
//! ======
//! Read once in `main` after `dotenvy` has loaded `.env`. Values that shape
//! behaviour (port, booleans, voice list, service URLs) fail start-up when
//! malformed; tuning knobs (timeouts, intervals) fall back to defaults.

use std::time::Duration;

use crate::services::speech::Voice;
use crate::services::suggestions::DEFAULT_ROTATION_INTERVAL;
use crate::services::weather::WeatherConfig;
use crate::upstream::config::{UpstreamConfig, env_parse_u64};
use crate::upstream::types::UpstreamError;

pub const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    /// Directory of the static frontend; `None` serves the API only.
    pub static_dir: Option<String>,
    pub upstream: UpstreamConfig,
    /// `None` when `OPENWEATHER_API_KEY` is unset.
    pub weather: Option<WeatherConfig>,
    pub suggestion_interval: Duration,
    pub voice_replies: bool,
    /// Voices offered by the server-side synthesizer; empty disables speech.
    pub speech_voices: Vec<Voice>,
}

impl AppConfig {
    /// Build the full config from environment variables.
    ///
    /// - `PORT`: default 4000
    /// - `STATIC_DIR`: optional
    /// - `SUGGESTION_INTERVAL_SECS`: default 5, zero is ignored
    /// - `VOICE_REPLIES`: true/false/1/0/yes/no/on/off, default true
    /// - `SPEECH_VOICES`: `name=lang,...`
    /// - upstream and weather keys, see [`UpstreamConfig::from_env`] and
    ///   [`WeatherConfig::from_env`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a malformed port, boolean, voice list or
    /// service URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match non_blank("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Parse(format!("invalid PORT '{raw}'")))?,
            None => DEFAULT_PORT,
        };

        let default_interval = DEFAULT_ROTATION_INTERVAL.as_secs();
        let interval_secs = match env_parse_u64("SUGGESTION_INTERVAL_SECS", default_interval) {
            0 => default_interval,
            secs => secs,
        };

        let voice_replies = match non_blank("VOICE_REPLIES") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Parse(format!("invalid VOICE_REPLIES '{raw}'")))?,
            None => true,
        };

        let speech_voices = match non_blank("SPEECH_VOICES") {
            Some(raw) => parse_voices(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            port,
            static_dir: non_blank("STATIC_DIR"),
            upstream: UpstreamConfig::from_env()?,
            weather: WeatherConfig::from_env(),
            suggestion_interval: Duration::from_secs(interval_secs),
            voice_replies,
            speech_voices,
        })
    }
}

fn non_blank(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `Samantha=en-US,Daniel=en-GB`. A bare name gets an empty language.
fn parse_voices(raw: &str) -> Result<Vec<Voice>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, lang) = entry.split_once('=').unwrap_or((entry, ""));
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::Parse(format!("SPEECH_VOICES entry '{entry}' has no name")));
            }
            Ok(Voice::new(name, lang.trim()))
        })
        .collect()
}


#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
