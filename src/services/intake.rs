//! Image intake — validates an upload and owns its preview handle.
//!
//! DESIGN
//! ======
//! A preview is a scoped resource: `PreviewRegistry` keeps the image bytes
//! addressable by id while a `PreviewHandle` is alive and drops the entry
//! when the handle is dropped. The session holds at most one handle, and the
//! previous one is released before the next is acquired, so there is never
//! more than one live preview per session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use super::orchestrator::OrchestratorError;
use crate::state::ImageFile;

// =============================================================================
// PREVIEW REGISTRY
// =============================================================================

#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Arc<ImageFile>>>>,
}

impl PreviewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<ImageFile>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `image` and return the handle that keeps it alive.
    #[must_use]
    pub fn acquire(&self, image: Arc<ImageFile>) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.lock().insert(id, image);
        debug!(%id, "preview acquired");
        PreviewHandle { id, registry: self.clone() }
    }

    /// Look up a live preview.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Arc<ImageFile>> {
        self.lock().get(&id).cloned()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, id: Uuid) {
        if self.lock().remove(&id).is_some() {
            debug!(%id, "preview released");
        }
    }
}

// =============================================================================
// PREVIEW HANDLE
// =============================================================================

/// Owning handle to one registered preview. Releases it on drop.
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path under which the HTTP layer serves this preview.
    #[must_use]
    pub fn url(&self) -> String {
        format!("/api/session/preview/{}", self.id)
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

// =============================================================================
// SELECTION
// =============================================================================

/// The image currently chosen in a session, together with its preview.
#[derive(Debug)]
pub struct SelectedImage {
    pub image: Arc<ImageFile>,
    pub preview: PreviewHandle,
}

/// Reject a missing or empty payload before anything is released.
pub(crate) fn validate(file: Option<ImageFile>) -> Result<ImageFile, OrchestratorError> {
    let file = file.ok_or_else(|| OrchestratorError::InvalidInput("no image file provided".into()))?;
    if file.bytes.is_empty() {
        return Err(OrchestratorError::InvalidInput("image file is empty".into()));
    }
    Ok(file)
}

/// Replace the selection in `slot` with `file`.
///
/// The old preview is dropped before the new one is registered. On a
/// validation error `slot` is left untouched.
pub(crate) fn select_into(
    registry: &PreviewRegistry,
    slot: &mut Option<SelectedImage>,
    file: Option<ImageFile>,
) -> Result<Uuid, OrchestratorError> {
    let file = validate(file)?;
    drop(slot.take());

    let image = Arc::new(file);
    let preview = registry.acquire(Arc::clone(&image));
    let id = preview.id();
    *slot = Some(SelectedImage { image, preview });
    Ok(id)
}

#[cfg(test)]
#[path = "intake_test.rs"]
mod tests;
