//! Speech playback controller.
//!
//! DESIGN
//! ======
//! Two states, `Idle` and `Speaking { utterance_id }`. The controller owns
//! the only handle to the active utterance and enforces one-at-a-time by
//! cancelling before every start; no lock is needed beyond the one the
//! orchestrator already holds around it.
//!
//! Speech is optional. A missing synthesizer or an empty voice list turns
//! `speak` into a silent no-op rather than an error.
//!
//! End-of-playback notifications arrive through `finished(id)`. Ids are
//! checked so the late "ended" event of a cancelled utterance cannot flip
//! a newer one back to `Idle`.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

/// Playback rate, slightly below natural speed.
pub const SPEECH_RATE: f32 = 0.95;

/// Voice names (whole-word, case-insensitive) preferred for quality English output.
pub const PREFERRED_VOICE_NAMES: [&str; 4] = ["Apple", "Samantha", "Alex", "en-GB"];

// =============================================================================
// SYNTHESIZER CAPABILITY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. `en-US`. May be empty when the platform omits it.
    pub lang: String,
}

impl Voice {
    #[must_use]
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self { name: name.into(), lang: lang.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: Uuid,
    pub text: String,
    pub voice: Voice,
    pub rate: f32,
}

/// Platform speech capability: list voices, speak, cancel.
pub trait SpeechSynthesizer: Send + Sync {
    fn voices(&self) -> Vec<Voice>;
    fn speak(&self, utterance: &Utterance);
    /// Stop whatever is currently playing.
    fn cancel(&self);
}

/// Preferred voice, else first English voice, else first voice.
#[must_use]
pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    voices
        .iter()
        .find(|v| PREFERRED_VOICE_NAMES.iter().any(|p| contains_word(&v.name, p)))
        .or_else(|| voices.iter().find(|v| v.lang.to_ascii_lowercase().starts_with("en")))
        .or_else(|| voices.first())
}

/// Case-insensitive whole-word match; `-` counts as part of a word.
fn contains_word(haystack: &str, word: &str) -> bool {
    let hay = haystack.to_ascii_lowercase();
    let word = word.to_ascii_lowercase();
    let is_word_char = |c: char| c.is_ascii_alphanumeric() || c == '_';

    hay.match_indices(&word).any(|(start, matched)| {
        let before = hay[..start].chars().next_back();
        let after = hay[start + matched.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking { utterance_id: Uuid },
}

pub struct SpeechController {
    synth: Option<Arc<dyn SpeechSynthesizer>>,
    state: PlaybackState,
}

impl SpeechController {
    #[must_use]
    pub fn new(synth: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { synth, state: PlaybackState::Idle }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        matches!(self.state, PlaybackState::Speaking { .. })
    }

    /// Voice `text`, cancelling any utterance in progress first.
    ///
    /// Returns the new utterance id, or `None` when speech is unavailable.
    pub fn speak(&mut self, text: &str) -> Option<Uuid> {
        let synth = self.synth.clone()?;
        let voices = synth.voices();
        let Some(voice) = select_voice(&voices) else {
            debug!("speech: no voices available");
            return None;
        };
        self.cancel_current(synth.as_ref());

        let utterance = Utterance { id: Uuid::new_v4(), text: text.to_string(), voice: voice.clone(), rate: SPEECH_RATE };
        self.state = PlaybackState::Speaking { utterance_id: utterance.id };
        info!(utterance_id = %utterance.id, voice = %utterance.voice.name, chars = text.len(), "speech: start");
        synth.speak(&utterance);
        Some(utterance.id)
    }

    /// Stop playback. No-op while idle.
    pub fn stop(&mut self) {
        if let Some(synth) = self.synth.clone() {
            self.cancel_current(synth.as_ref());
        }
        self.state = PlaybackState::Idle;
    }

    /// Playback of `utterance_id` ended on its own. Returns whether the
    /// controller went back to `Idle`.
    pub fn finished(&mut self, utterance_id: Uuid) -> bool {
        match self.state {
            PlaybackState::Speaking { utterance_id: active } if active == utterance_id => {
                debug!(%utterance_id, "speech: end");
                self.state = PlaybackState::Idle;
                true
            }
            _ => false,
        }
    }

    fn cancel_current(&mut self, synth: &dyn SpeechSynthesizer) {
        if let PlaybackState::Speaking { utterance_id } = self.state {
            synth.cancel();
            self.state = PlaybackState::Idle;
            debug!(%utterance_id, "speech: cancelled");
        }
    }
}

// =============================================================================
// SERVER SYNTHESIZER
// =============================================================================

/// Synthesizer for headless deployments: utterances are logged, and the
/// client reports their end through the session API.
pub struct TracingSynthesizer {
    voices: Vec<Voice>,
}

impl TracingSynthesizer {
    #[must_use]
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }
}

impl SpeechSynthesizer for TracingSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: &Utterance) {
        info!(
            utterance_id = %utterance.id,
            voice = %utterance.voice.name,
            lang = %utterance.voice.lang,
            rate = utterance.rate,
            text = %utterance.text,
            "speak"
        );
    }

    fn cancel(&self) {
        info!("speech cancelled");
    }
}

#[cfg(test)]
#[path = "speech_test.rs"]
mod tests;
