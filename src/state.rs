//! Shared application state and the core data model.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the single orchestrator for this process (one interaction stream),
//! the weather client and the suggestion rotator. The plain data types the
//! orchestrator moves around (`Diagnosis`, `ChatTurn`, ...) live here so the
//! upstream adapters and the services share one definition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::services::orchestrator::Orchestrator;
use crate::services::suggestions::SuggestionRotator;
use crate::services::weather::WeatherClient;

// =============================================================================
// IMAGE
// =============================================================================

/// A raw uploaded image: the bytes plus whatever metadata the client sent.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

// =============================================================================
// DIAGNOSIS
// =============================================================================

/// Normalized result of analyzing a crop image. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub plant: String,
    pub disease: String,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub advice: String,
    /// Never empty; see `services::diagnosis::FALLBACK_RELATED_IMAGES`.
    #[serde(rename = "relatedImages")]
    pub related_images: Vec<String>,
}

impl Diagnosis {
    /// Confidence as a rounded whole percentage.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn confidence_percent(&self) -> u32 {
        // confidence is clamped to [0, 1], so the product fits in u32.
        (self.confidence * 100.0).round() as u32
    }

    /// The `{plant, disease}` pair forwarded to the chat service.
    #[must_use]
    pub fn context(&self) -> ImageContext {
        ImageContext { plant: self.plant.clone(), disease: self.disease.clone() }
    }
}

/// Diagnosis context attached to each chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContext {
    pub plant: String,
    pub disease: String,
}

// =============================================================================
// CHAT TURN
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub suggestions: SuggestionRotator,
    /// `None` when `OPENWEATHER_API_KEY` is not configured.
    pub weather: Option<Arc<WeatherClient>>,
}

impl AppState {
    #[must_use]
    pub fn new(orchestrator: Orchestrator, suggestions: SuggestionRotator, weather: Option<Arc<WeatherClient>>) -> Self {
        Self { orchestrator, suggestions, weather }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::orchestrator::OrchestratorSettings;
    use crate::services::speech::{SpeechSynthesizer, TracingSynthesizer, Voice};
    use crate::services::suggestions::SuggestionPool;
    use crate::upstream::UpstreamClients;
    use crate::upstream::stub::{StubChat, StubVision};

    /// `AppState` backed by the in-process stub services, one speech voice
    /// and voiced replies off.
    #[must_use]
    pub fn test_app_state() -> AppState {
        let clients = UpstreamClients { vision: Arc::new(StubVision), chat: Arc::new(StubChat) };
        let synth: Arc<dyn SpeechSynthesizer> = Arc::new(TracingSynthesizer::new(vec![Voice::new("Samantha", "en-US")]));
        let settings = OrchestratorSettings { voice_enabled: false, ..OrchestratorSettings::default() };
        let orchestrator = Orchestrator::new(clients, Some(synth), settings);
        AppState::new(orchestrator, SuggestionRotator::new(Arc::new(SuggestionPool::generate())), None)
    }

    /// A small non-empty image payload.
    #[must_use]
    pub fn dummy_image() -> ImageFile {
        ImageFile { name: "leaf.jpg".into(), content_type: Some("image/jpeg".into()), bytes: vec![0xFF, 0xD8, 0xFF, 0xE0] }
    }

    /// The Tomato / Early blight diagnosis used across scenario tests.
    #[must_use]
    pub fn tomato_diagnosis() -> Diagnosis {
        Diagnosis {
            plant: "Tomato".into(),
            disease: "Early blight".into(),
            confidence: 0.88,
            advice: "Remove lower leaves and rotate crops.".into(),
            related_images: vec!["https://img.test/1.jpg".into()],
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
