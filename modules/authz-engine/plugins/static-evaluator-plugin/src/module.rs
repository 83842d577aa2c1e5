//! Static remote evaluator plugin module.

use std::sync::Arc;

use authz_engine_sdk::RemoteEvaluatorClient;
use tracing::info;

use crate::config::StaticEvaluatorConfig;
use crate::domain::Service;

/// Static remote evaluator plugin module.
pub struct StaticEvaluatorPlugin;

impl StaticEvaluatorPlugin {
    /// Build the plugin client for `cfg`.
    #[must_use]
    pub fn init(cfg: StaticEvaluatorConfig) -> Arc<dyn RemoteEvaluatorClient> {
        info!(
            mode = ?cfg.mode,
            grants = cfg.grants.len(),
            "Initializing static_evaluator_plugin"
        );
        let api: Arc<dyn RemoteEvaluatorClient> = Arc::new(Service::new(cfg));
        info!("Static evaluator plugin initialized");
        api
    }
}
