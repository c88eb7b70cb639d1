//! Session state for one interaction stream.
//!
//! Owned exclusively by the `Orchestrator`; every mutation goes through its
//! methods. Nothing here is persisted, and dropping the session releases its
//! preview.

use serde::Serialize;

use super::conversation::Transcript;
use super::intake::SelectedImage;
use crate::state::{ChatTurn, Diagnosis};

#[derive(Debug, Default)]
pub struct Session {
    pub(crate) image: Option<SelectedImage>,
    pub(crate) diagnosis: Option<Diagnosis>,
    pub(crate) transcript: Transcript,
    pub(crate) speaking: bool,
    /// Text currently in the chat input box.
    pub(crate) chat_input: String,
    pub(crate) voice_enabled: bool,
    /// Bumped on every diagnosis request; a reply is applied only if its
    /// generation is still the latest.
    pub(crate) diagnosis_generation: u64,
    /// Bumped by every teardown; chat replies from an earlier epoch are dropped.
    pub(crate) epoch: u64,
}

impl Session {
    #[must_use]
    pub fn new(voice_enabled: bool) -> Self {
        Self { voice_enabled, ..Self::default() }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            preview_url: self.image.as_ref().map(|s| s.preview.url()),
            diagnosis: self.diagnosis.clone(),
            transcript: self.transcript.turns().to_vec(),
            speaking: self.speaking,
            chat_input: self.chat_input.clone(),
            voice_enabled: self.voice_enabled,
        }
    }
}

/// Read-only copy of the session handed to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(rename = "previewUrl")]
    pub preview_url: Option<String>,
    pub diagnosis: Option<Diagnosis>,
    pub transcript: Vec<ChatTurn>,
    pub speaking: bool,
    #[serde(rename = "chatInput")]
    pub chat_input: String,
    #[serde(rename = "voiceEnabled")]
    pub voice_enabled: bool,
}
