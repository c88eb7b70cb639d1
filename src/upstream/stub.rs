//! In-process stub services.
//!
//! DESIGN
//! ======
//! Stand-ins for the real vision and chat models so the whole flow runs
//! without any external dependency. The HTTP stub endpoints in
//! `routes::stub` serve the same answers, so a deployment can point
//! `VISION_SERVICE_URL` / `CHAT_SERVICE_URL` at itself.

use super::types::{ChatService, RawDiagnosis, UpstreamError, VisionService};
use crate::state::{ChatTurn, ImageContext, ImageFile, Role};

pub const STUB_PLANT: &str = "Maize";
pub const STUB_DISEASE: &str = "Northern Leaf Blight";
pub const STUB_CONFIDENCE: f64 = 0.87;
pub const STUB_ADVICE: &str =
    "Remove affected leaves and apply recommended fungicide according to local regulations.";

// =============================================================================
// VISION
// =============================================================================

/// Always answers with the same mock diagnosis. Omits `relatedImages`, so the
/// orchestrator's fallback path is exercised on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubVision;

impl StubVision {
    #[must_use]
    pub fn mock_result() -> RawDiagnosis {
        RawDiagnosis {
            plant: Some(STUB_PLANT.into()),
            disease: Some(STUB_DISEASE.into()),
            confidence: Some(serde_json::json!(STUB_CONFIDENCE)),
            advice: Some(STUB_ADVICE.into()),
            related_images: None,
        }
    }
}

#[async_trait::async_trait]
impl VisionService for StubVision {
    async fn analyze(&self, image: &ImageFile) -> Result<RawDiagnosis, UpstreamError> {
        tracing::debug!(bytes = image.bytes.len(), "stub vision: returning mock diagnosis");
        Ok(Self::mock_result())
    }
}

// =============================================================================
// CHAT
// =============================================================================

/// Keyword-driven canned replies that reference the diagnosis context.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubChat;

impl StubChat {
    #[must_use]
    pub fn compose_reply(turns: &[ChatTurn], context: Option<&ImageContext>) -> String {
        let question = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map_or("", |t| t.text.trim());
        let guidance = guidance_for(question);

        match context {
            Some(ctx) => format!("For your {} with {}: {guidance}", ctx.plant, ctx.disease),
            None => format!("Upload a photo of the affected crop for a diagnosis. Meanwhile: {guidance}"),
        }
    }
}

fn guidance_for(question: &str) -> &'static str {
    let q = question.to_lowercase();
    if q.contains("fungicide") || q.contains("spray") || q.contains("chemical") {
        "apply an approved fungicide, following the label and local regulations, early in the morning."
    } else if q.contains("organic") {
        "remove infected leaves, improve airflow and consider neem or copper-based organic treatments."
    } else if q.contains("prevent") {
        "rotate crops, use certified seed and keep the field free of infected debris."
    } else if q.contains("prune") {
        "prune affected branches with clean tools and dispose of the cuttings away from the field."
    } else {
        "monitor the affected plants and consult a local extension officer if symptoms spread."
    }
}

#[async_trait::async_trait]
impl ChatService for StubChat {
    async fn reply(&self, turns: &[ChatTurn], context: Option<&ImageContext>) -> Result<String, UpstreamError> {
        Ok(Self::compose_reply(turns, context))
    }
}

#[cfg(test)]
#[path = "stub_test.rs"]
mod tests;
