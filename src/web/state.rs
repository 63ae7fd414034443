use std::sync::Arc;

use crate::config::AppConfig;
use crate::execution::RetryEngine;
use crate::generate::Orchestrator;
use crate::learning::LearningStore;
use crate::metadata::client::MetadataClient;
use crate::metadata::ConversationStore;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub engine: Arc<RetryEngine>,
    pub conversations: Arc<dyn ConversationStore>,
    pub metadata: Arc<MetadataClient>,
    pub learning: Arc<LearningStore>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        orchestrator: Arc<Orchestrator>,
        engine: Arc<RetryEngine>,
        conversations: Arc<dyn ConversationStore>,
        metadata: Arc<MetadataClient>,
        learning: Arc<LearningStore>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            engine,
            conversations,
            metadata,
            learning,
            startup_time: chrono::Utc::now(),
        }
    }
}
