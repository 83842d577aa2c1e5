//! Configuration for the static remote evaluator plugin.

use authz_engine_sdk::{CredentialDefinition, Dependency, ErrorCode, Privilege};
use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticEvaluatorConfig {
    pub mode: EvaluatorMode,

    /// Grant table used in `grants` mode.
    pub grants: Vec<StaticGrant>,

    /// Error body returned in `unavailable` mode.
    pub outage: SimulatedOutage,
}

/// Evaluation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorMode {
    AllowAll,
    DenyAll,
    #[default]
    Grants,
    Unavailable,
}

/// Holders of `credential` get `privileges`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticGrant {
    pub credential: CredentialDefinition,
    pub privileges: Vec<Privilege>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatedOutage {
    pub code: ErrorCode,
    pub dependency: Option<Dependency>,
    pub retry_after_ms: Option<u64>,
}

impl Default for SimulatedOutage {
    fn default() -> Self {
        Self {
            code: ErrorCode::DependencyUnavailable,
            dependency: Some(Dependency::Database),
            retry_after_ms: Some(1_000),
        }
    }
}
