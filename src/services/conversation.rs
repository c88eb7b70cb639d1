//! Conversation engine — append-only transcript and the chat call.
//!
//! DESIGN
//! ======
//! `Transcript` only exposes `push` and read access, so earlier turns can
//! never be edited or reordered. The orchestrator appends the user turn
//! before calling `request_reply`, and a failed call leaves that turn in
//! place: the user sees their message plus an error notice, never a silent
//! rollback.

use std::fmt::Write;
use std::time::Duration;

use tracing::{info, warn};

use super::orchestrator::{Action, OrchestratorError};
use crate::state::{ChatTurn, ImageContext, Role};
use crate::upstream::types::{ChatService, UpstreamError};

/// Display name of the assistant in copied transcripts.
pub const ASSISTANT_NAME: &str = "Shibo AI";
const USER_NAME: &str = "You";

// =============================================================================
// TRANSCRIPT
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// Plain-text rendering for copying the chat: one block per turn.
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for (i, turn) in self.turns.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            let speaker = match turn.role {
                Role::User => USER_NAME,
                Role::Assistant => ASSISTANT_NAME,
            };
            let _ = write!(out, "{speaker}: {}", turn.text);
        }
        out
    }
}

/// Blank or whitespace-only input is never sent.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

// =============================================================================
// CHAT CALL
// =============================================================================

/// Ask the chat service for the next assistant reply.
///
/// # Errors
///
/// - [`OrchestratorError::UpstreamTimeout`] when `timeout` elapses first
/// - [`OrchestratorError::ChatFailed`] for any other upstream failure
pub async fn request_reply(
    chat: &dyn ChatService,
    turns: &[ChatTurn],
    context: Option<&ImageContext>,
    timeout: Duration,
) -> Result<String, OrchestratorError> {
    info!(turns = turns.len(), has_context = context.is_some(), "chat: requesting reply");

    match tokio::time::timeout(timeout, chat.reply(turns, context)).await {
        Ok(Ok(text)) => {
            info!(reply_len = text.len(), "chat: reply received");
            Ok(text)
        }
        Err(_) | Ok(Err(UpstreamError::Timeout)) => {
            warn!(timeout_secs = timeout.as_secs(), "chat: service timed out");
            Err(OrchestratorError::UpstreamTimeout { action: Action::Chat, secs: timeout.as_secs() })
        }
        Ok(Err(e)) => {
            warn!(error = %e, "chat: service failed");
            Err(OrchestratorError::ChatFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
