use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::nats::NatsClient;
use crate::pipeline::{PipelineContext, SubtitleSession};
use crate::recognition::SourceFactory;
use crate::translation::TranslationOrchestrator;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active subtitle sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<SubtitleSession>>>>,

    pub config: Arc<Config>,

    /// Shared by every session
    pub context: Arc<PipelineContext>,

    /// Serves one-shot test translations
    pub orchestrator: TranslationOrchestrator,

    /// Creates the recognition source of each new session
    pub sources: Arc<dyn SourceFactory>,

    /// Set when session events should also go out over NATS
    pub publisher: Option<Arc<NatsClient>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        context: Arc<PipelineContext>,
        sources: Arc<dyn SourceFactory>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
            orchestrator: TranslationOrchestrator::new(Arc::clone(&context)),
            context,
            sources,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<NatsClient>) -> Self {
        self.publisher = Some(publisher);
        self
    }
}
