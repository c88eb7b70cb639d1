//! Diagnosis invocation — vision call, normalization and the summary turn.
//!
//! DESIGN
//! ======
//! The vision reply is loose (`RawDiagnosis`); `normalize` turns it into the
//! canonical `Diagnosis`. Missing or empty `relatedImages` are replaced by
//! `FALLBACK_RELATED_IMAGES`, a fixed list, so the same input always yields
//! the same record. The call is bounded by the request timeout and never
//! retried here.

use std::time::Duration;

use tracing::{info, warn};

use super::orchestrator::{Action, OrchestratorError};
use crate::state::{Diagnosis, ImageFile};
use crate::upstream::types::{RawDiagnosis, UpstreamError, VisionService};

/// Generic reference photos shown when the vision service sends none.
pub const FALLBACK_RELATED_IMAGES: [&str; 3] = [
    "https://images.unsplash.com/photo-1501004318641-b39e6451bec6?w=800&q=60&auto=format&fit=crop",
    "https://images.unsplash.com/photo-1524594154909-14f6f3f6f64e?w=800&q=60&auto=format&fit=crop",
    "https://images.unsplash.com/photo-1528825871115-3581a5387919?w=800&q=60&auto=format&fit=crop",
];

const UNKNOWN_PLANT: &str = "Unknown plant";
const UNKNOWN_DISEASE: &str = "Unknown disease";

#[must_use]
pub fn fallback_related_images() -> Vec<String> {
    FALLBACK_RELATED_IMAGES.iter().map(ToString::to_string).collect()
}

// =============================================================================
// NORMALIZATION
// =============================================================================

#[must_use]
pub fn normalize(raw: RawDiagnosis) -> Diagnosis {
    let confidence = raw
        .confidence
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|c| c.is_finite())
        .map_or(0.0, |c| c.clamp(0.0, 1.0));

    let related_images = match raw.related_images {
        Some(images) if !images.is_empty() => images,
        _ => fallback_related_images(),
    };

    Diagnosis {
        plant: non_blank(raw.plant).unwrap_or_else(|| UNKNOWN_PLANT.into()),
        disease: non_blank(raw.disease).unwrap_or_else(|| UNKNOWN_DISEASE.into()),
        confidence,
        advice: non_blank(raw.advice).unwrap_or_default(),
        related_images,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Text of the assistant turn appended after a successful diagnosis.
#[must_use]
pub fn summary_text(diagnosis: &Diagnosis) -> String {
    let advice = if diagnosis.advice.is_empty() { "No advice provided." } else { diagnosis.advice.as_str() };
    format!(
        "{}: {} ({}% confidence).\nAdvice: {advice}",
        diagnosis.plant,
        diagnosis.disease,
        diagnosis.confidence_percent()
    )
}

// =============================================================================
// INVOCATION
// =============================================================================

/// Run one vision call and normalize its reply.
///
/// # Errors
///
/// - [`OrchestratorError::UpstreamTimeout`] when `timeout` elapses first
/// - [`OrchestratorError::DiagnosisFailed`] for any other upstream failure
pub async fn invoke(
    vision: &dyn VisionService,
    image: &ImageFile,
    timeout: Duration,
) -> Result<Diagnosis, OrchestratorError> {
    info!(image = %image.name, bytes = image.bytes.len(), "diagnosis: invoking vision service");

    let raw = match tokio::time::timeout(timeout, vision.analyze(image)).await {
        Ok(Ok(raw)) => raw,
        Err(_) | Ok(Err(UpstreamError::Timeout)) => {
            warn!(timeout_secs = timeout.as_secs(), "diagnosis: vision service timed out");
            return Err(OrchestratorError::UpstreamTimeout { action: Action::Diagnosis, secs: timeout.as_secs() });
        }
        Ok(Err(e)) => {
            warn!(error = %e, "diagnosis: vision service failed");
            return Err(OrchestratorError::DiagnosisFailed(e.to_string()));
        }
    };

    let diagnosis = normalize(raw);
    info!(
        plant = %diagnosis.plant,
        disease = %diagnosis.disease,
        confidence = diagnosis.confidence,
        "diagnosis: complete"
    );
    Ok(diagnosis)
}

#[cfg(test)]
#[path = "diagnosis_test.rs"]
mod tests;
