use std::sync::Arc;

use smartbi_core::config::SmartBiConfig;
use smartbi_core::llm::ModelClient;
use smartbi_core::SmartBiError;

/// Shared by every worker. Nothing here is mutated after startup.
pub struct AppState {
    pub config: SmartBiConfig,
    pub model: Option<Arc<dyn ModelClient>>,
}

impl AppState {
    pub fn new(config: SmartBiConfig, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self { config, model }
    }

    /// The configured model, or `ModelNotConfigured`.
    pub fn model(&self) -> Result<&dyn ModelClient, SmartBiError> {
        self.model.as_deref().ok_or(SmartBiError::ModelNotConfigured)
    }
}
