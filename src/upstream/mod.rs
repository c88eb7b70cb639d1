//! Upstream — adapters for the external vision and chat services.
//!
//! DESIGN
//! ======
//! The orchestrator depends only on the `VisionService` / `ChatService`
//! traits. `UpstreamClients::from_config` picks an HTTP client when a URL is
//! configured and the in-process stub otherwise, so a missing URL never
//! prevents start-up.

pub mod chat;
pub mod config;
pub mod stub;
pub mod types;
pub mod vision;

use std::sync::Arc;

use config::UpstreamConfig;
use types::{ChatService, UpstreamError, VisionService};

/// The pair of services handed to the orchestrator.
pub struct UpstreamClients {
    pub vision: Arc<dyn VisionService>,
    pub chat: Arc<dyn ChatService>,
}

impl UpstreamClients {
    /// Build clients from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let vision: Arc<dyn VisionService> = match &config.vision_url {
            Some(url) => {
                tracing::info!(%url, "vision service: http");
                Arc::new(vision::HttpVisionClient::new(url.clone(), config.timeouts)?)
            }
            None => {
                tracing::info!("vision service: in-process stub");
                Arc::new(stub::StubVision)
            }
        };

        let chat: Arc<dyn ChatService> = match &config.chat_url {
            Some(url) => {
                tracing::info!(%url, "chat service: http");
                Arc::new(chat::HttpChatClient::new(url.clone(), config.timeouts)?)
            }
            None => {
                tracing::info!("chat service: in-process stub");
                Arc::new(stub::StubChat)
            }
        };

        Ok(Self { vision, chat })
    }
}
