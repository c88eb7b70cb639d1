//! Orchestrator — the single owner of a session and its collaborators.
//!
//! DESIGN
//! ======
//! Callers never touch `Session` directly: image selection, diagnosis, chat
//! and speech all go through the methods here. Session and speech state sit
//! behind short-lived `std::sync::Mutex` locks that are never held across an
//! `.await`; network calls run with no lock held.
//!
//! Ordering:
//! - `send_turn` appends the user turn and snapshots the transcript before
//!   it suspends. Replies go through `reply_gate`, a FIFO async mutex, so
//!   assistant turns land in send order even if calls overlap.
//! - `diagnose` tags each request with a generation number. A reply whose
//!   generation is no longer the latest is dropped with
//!   `OrchestratorError::Superseded` instead of overwriting a newer result.
//! - `end_session` bumps the session epoch. A chat reply captured under an
//!   older epoch is dropped with `OrchestratorError::SessionEnded`.
//! - Lock order is speech, then session.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use super::conversation;
use super::diagnosis;
use super::intake::{self, PreviewRegistry};
use super::session::{Session, SessionSnapshot};
use super::speech::{SpeechController, SpeechSynthesizer};
use crate::state::{ChatTurn, Diagnosis, ImageFile};
use crate::upstream::UpstreamClients;
use crate::upstream::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::upstream::types::{ChatService, VisionService};

// =============================================================================
// ERRORS
// =============================================================================

/// The user-facing action an upstream failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Diagnosis,
    Chat,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagnosis => f.write_str("diagnosis"),
            Self::Chat => f.write_str("chat"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{action} timed out after {secs}s")]
    UpstreamTimeout { action: Action, secs: u64 },
    #[error("diagnosis failed: {0}")]
    DiagnosisFailed(String),
    #[error("chat failed: {0}")]
    ChatFailed(String),
    #[error("diagnosis superseded by a newer request")]
    Superseded,
    #[error("session ended before the reply arrived")]
    SessionEnded,
}

impl crate::error::ErrorCode for OrchestratorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::UpstreamTimeout { .. } => "E_UPSTREAM_TIMEOUT",
            Self::DiagnosisFailed(_) => "E_DIAGNOSIS_FAILED",
            Self::ChatFailed(_) => "E_CHAT_FAILED",
            Self::Superseded => "E_SUPERSEDED",
            Self::SessionEnded => "E_SESSION_ENDED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. } | Self::DiagnosisFailed(_) | Self::ChatFailed(_))
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Upper bound on a single vision or chat call.
    pub request_timeout: Duration,
    /// Whether assistant replies are voiced by default.
    pub voice_enabled: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS), voice_enabled: true }
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

#[derive(Clone)]
pub struct Orchestrator {
    session: Arc<Mutex<Session>>,
    speech: Arc<Mutex<SpeechController>>,
    previews: PreviewRegistry,
    vision: Arc<dyn VisionService>,
    chat: Arc<dyn ChatService>,
    reply_gate: Arc<tokio::sync::Mutex<()>>,
    request_timeout: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        clients: UpstreamClients,
        synth: Option<Arc<dyn SpeechSynthesizer>>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(settings.voice_enabled))),
            speech: Arc::new(Mutex::new(SpeechController::new(synth))),
            previews: PreviewRegistry::new(),
            vision: clients.vision,
            chat: clients.chat,
            reply_gate: Arc::new(tokio::sync::Mutex::new(())),
            request_timeout: settings.request_timeout,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn speech(&self) -> MutexGuard<'_, SpeechController> {
        self.speech.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Image intake
    // -------------------------------------------------------------------------

    /// Select a new image, releasing the previous preview. Returns the new
    /// preview id.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::InvalidInput`] for a missing or empty file.
    pub fn select_image(&self, file: Option<ImageFile>) -> Result<Uuid, OrchestratorError> {
        let mut session = self.session();
        let id = intake::select_into(&self.previews, &mut session.image, file)?;
        info!(preview_id = %id, "image selected");
        Ok(id)
    }

    /// Bytes of a live preview; `None` once released.
    #[must_use]
    pub fn preview(&self, id: Uuid) -> Option<Arc<ImageFile>> {
        self.previews.get(id)
    }

    /// Drop the selected image and the current diagnosis. The transcript stays.
    pub fn clear_image(&self) {
        let mut session = self.session();
        session.image = None;
        session.diagnosis = None;
        info!("image and diagnosis cleared");
    }

    // -------------------------------------------------------------------------
    // Diagnosis
    // -------------------------------------------------------------------------

    /// Diagnose the currently selected image.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::InvalidInput`] when no image is selected, plus
    /// every error of [`Orchestrator::diagnose`].
    pub async fn diagnose_selected(&self) -> Result<Diagnosis, OrchestratorError> {
        let selected = {
            let session = self.session();
            session.image.as_ref().map(|s| Arc::clone(&s.image))
        };
        let image = selected.ok_or_else(|| OrchestratorError::InvalidInput("choose a photo first".into()))?;
        self.diagnose(&image).await
    }

    /// Send `image` to the vision service and, on success, replace the
    /// session's diagnosis and append the summary turn.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::InvalidInput`] for an empty payload (no I/O)
    /// - [`OrchestratorError::UpstreamTimeout`] / [`OrchestratorError::DiagnosisFailed`]
    ///   from the vision call; the session is left unchanged
    /// - [`OrchestratorError::Superseded`] when a newer request was issued
    ///   while this one was in flight
    pub async fn diagnose(&self, image: &ImageFile) -> Result<Diagnosis, OrchestratorError> {
        if image.bytes.is_empty() {
            return Err(OrchestratorError::InvalidInput("image file is empty".into()));
        }

        let generation = {
            let mut session = self.session();
            session.diagnosis_generation += 1;
            session.diagnosis_generation
        };

        let diagnosis = diagnosis::invoke(self.vision.as_ref(), image, self.request_timeout).await?;

        let mut session = self.session();
        if session.diagnosis_generation != generation {
            warn!(generation, latest = session.diagnosis_generation, "diagnosis: stale result discarded");
            return Err(OrchestratorError::Superseded);
        }
        session.transcript.push(ChatTurn::assistant(diagnosis::summary_text(&diagnosis)));
        session.diagnosis = Some(diagnosis.clone());
        Ok(diagnosis)
    }

    // -------------------------------------------------------------------------
    // Conversation
    // -------------------------------------------------------------------------

    /// Send one user turn and append the assistant's reply.
    ///
    /// Returns `Ok(None)` without any I/O for blank input. The user turn is
    /// appended before the chat call and stays even if the call fails.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::ChatFailed`] or [`OrchestratorError::UpstreamTimeout`]
    /// - [`OrchestratorError::SessionEnded`] when the session was torn down
    ///   while the call was in flight; the reply is neither stored nor voiced
    pub async fn send_turn(&self, user_text: &str) -> Result<Option<String>, OrchestratorError> {
        if conversation::is_blank(user_text) {
            return Ok(None);
        }

        let (epoch, turns, context) = {
            let mut session = self.session();
            session.transcript.push(ChatTurn::user(user_text));
            session.chat_input.clear();
            let context = session.diagnosis.as_ref().map(Diagnosis::context);
            (session.epoch, session.transcript.turns().to_vec(), context)
        };

        let _gate = self.reply_gate.lock().await;
        let reply = conversation::request_reply(self.chat.as_ref(), &turns, context.as_ref(), self.request_timeout)
            .await?;

        let voice_enabled = {
            let mut session = self.session();
            if session.epoch != epoch {
                warn!(epoch, current = session.epoch, "chat: reply for ended session discarded");
                return Err(OrchestratorError::SessionEnded);
            }
            session.transcript.push(ChatTurn::assistant(reply.clone()));
            session.voice_enabled
        };
        if voice_enabled {
            self.speak(&reply);
        }
        Ok(Some(reply))
    }

    #[must_use]
    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.session().transcript.turns().to_vec()
    }

    /// Transcript as `You: ...` / `Shibo AI: ...` text for the clipboard.
    #[must_use]
    pub fn copy_transcript(&self) -> String {
        self.session().transcript.render_plain()
    }

    #[must_use]
    pub fn diagnosis(&self) -> Option<Diagnosis> {
        self.session().diagnosis.clone()
    }

    // -------------------------------------------------------------------------
    // Chat input
    // -------------------------------------------------------------------------

    /// Copy a suggestion into the chat input. Never sends.
    pub fn select_suggestion(&self, text: &str) {
        self.session().chat_input = text.to_string();
    }

    pub fn set_chat_input(&self, text: &str) {
        self.session().chat_input = text.to_string();
    }

    #[must_use]
    pub fn chat_input(&self) -> String {
        self.session().chat_input.clone()
    }

    // -------------------------------------------------------------------------
    // Speech
    // -------------------------------------------------------------------------

    pub fn set_voice_enabled(&self, enabled: bool) {
        self.session().voice_enabled = enabled;
    }

    /// Voice `text`, cancelling whatever is playing. Silent if speech is
    /// unavailable.
    pub fn speak(&self, text: &str) -> Option<Uuid> {
        let mut speech = self.speech();
        let id = speech.speak(text);
        self.session().speaking = speech.is_speaking();
        id
    }

    pub fn stop_speaking(&self) {
        let mut speech = self.speech();
        speech.stop();
        self.session().speaking = false;
    }

    /// "Play last / Stop" control: stop when speaking, otherwise voice the
    /// last transcript turn. Returns whether playback is active afterwards.
    pub fn toggle_playback(&self) -> bool {
        if self.is_speaking() {
            self.stop_speaking();
            return false;
        }
        let last = self.session().transcript.last().map(|t| t.text.clone());
        match last {
            Some(text) => self.speak(&text).is_some(),
            None => false,
        }
    }

    /// End-of-playback callback from the synthesizer.
    pub fn utterance_finished(&self, utterance_id: Uuid) -> bool {
        let mut speech = self.speech();
        let ended = speech.finished(utterance_id);
        self.session().speaking = speech.is_speaking();
        ended
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.session().speaking
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session().snapshot()
    }

    /// Tear the session down: stop speech, release the preview and forget
    /// the diagnosis and transcript.
    pub fn end_session(&self) {
        let mut speech = self.speech();
        speech.stop();
        let mut session = self.session();
        let voice_enabled = session.voice_enabled;
        let generation = session.diagnosis_generation;
        let epoch = session.epoch;
        *session = Session::new(voice_enabled);
        // Keep counting so in-flight diagnosis and chat replies cannot land in the new session.
        session.diagnosis_generation = generation + 1;
        session.epoch = epoch + 1;
        info!("session ended");
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
