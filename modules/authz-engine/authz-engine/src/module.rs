//! Authorization engine wiring.

use std::sync::Arc;

use authz_engine_sdk::{AuthzEngineClient, RemoteEvaluatorClient};
use tracing::info;

use crate::config::AuthzEngineConfig;
use crate::domain::{
    AuthzEngineLocalClient, CurrentRules, PolicyRepository, PolicyRuleSource, RemoteEvaluator,
    Service,
};

pub const MODULE_NAME: &str = "authz-engine";

/// Builder that assembles the engine from its configuration and adapters.
///
/// ```ignore
/// let engine = AuthzEngineModule::new(config)
///     .with_repository(store)
///     .build()?;
/// ```
#[must_use]
pub struct AuthzEngineModule {
    config: AuthzEngineConfig,
    repository: Option<Arc<dyn PolicyRepository>>,
    rule_source: Option<Arc<dyn PolicyRuleSource>>,
    remote_client: Option<Arc<dyn RemoteEvaluatorClient>>,
}

impl AuthzEngineModule {
    pub fn new(config: AuthzEngineConfig) -> Self {
        Self {
            config,
            repository: None,
            rule_source: None,
            remote_client: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn PolicyRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Source of recomputed rules for resets. Defaults to [`CurrentRules`].
    pub fn with_rule_source(mut self, rule_source: Arc<dyn PolicyRuleSource>) -> Self {
        self.rule_source = Some(rule_source);
        self
    }

    pub fn with_remote_evaluator(mut self, client: Arc<dyn RemoteEvaluatorClient>) -> Self {
        self.remote_client = Some(client);
        self
    }

    /// Build the domain service.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, no repository was given, or
    /// remote evaluation is enabled without a remote evaluator client.
    pub fn build_service(self) -> anyhow::Result<Arc<Service>> {
        let cfg = self.config;
        info!(
            enforcement_enabled = cfg.enforcement_enabled,
            remote_enabled = cfg.remote.enabled,
            max_depth = cfg.aggregation.max_depth,
            "Initializing {MODULE_NAME} module"
        );
        cfg.validate()?;

        let repo = self
            .repository
            .ok_or_else(|| anyhow::anyhow!("{MODULE_NAME}: a policy repository is required"))?;
        let rule_source = self
            .rule_source
            .unwrap_or_else(|| Arc::new(CurrentRules) as Arc<dyn PolicyRuleSource>);

        let remote = match (cfg.remote.enabled, self.remote_client) {
            (true, Some(client)) => Some(RemoteEvaluator::new(client, &cfg.remote)),
            (true, None) => anyhow::bail!(
                "{MODULE_NAME}: remote evaluation is enabled but no remote evaluator is registered"
            ),
            (false, _) => None,
        };
        if remote.is_some() {
            info!(
                resource_types = ?cfg.remote.resource_types,
                fallback = ?cfg.remote.fallback,
                "remote evaluation enabled"
            );
        }

        let svc = Arc::new(Service::new(&cfg, repo, rule_source, remote));
        info!("{MODULE_NAME} module initialized successfully");
        Ok(svc)
    }

    /// Build the engine and return its client.
    ///
    /// # Errors
    ///
    /// See [`AuthzEngineModule::build_service`].
    pub fn build(self) -> anyhow::Result<Arc<dyn AuthzEngineClient>> {
        let svc = self.build_service()?;
        let api: Arc<dyn AuthzEngineClient> = Arc::new(AuthzEngineLocalClient::new(svc));
        Ok(api)
    }
}
