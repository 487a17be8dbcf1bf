use crate::observability::ObservabilityState;
use crate::services::{EmbeddingComparison, Orchestrator};
use std::sync::Arc;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Question answering workflow
    pub orchestrator: Arc<Orchestrator>,
    /// Answer model used when a request does not name one
    pub default_model: String,
    /// Metrics and health checks
    pub observability: Arc<ObservabilityState>,
    /// Side-by-side embedding comparison corpora
    pub comparison: Arc<EmbeddingComparison>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &"Arc<Orchestrator>")
            .field("default_model", &self.default_model)
            .field("observability", &"Arc<ObservabilityState>")
            .field("comparison_corpora", &self.comparison.len())
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        orchestrator: Orchestrator,
        default_model: impl Into<String>,
        observability: Arc<ObservabilityState>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            default_model: default_model.into(),
            observability,
            comparison: Arc::new(EmbeddingComparison::new()),
        }
    }

    /// Attach the embedding comparison corpora
    pub fn with_comparison(mut self, comparison: EmbeddingComparison) -> Self {
        self.comparison = Arc::new(comparison);
        self
    }
}
