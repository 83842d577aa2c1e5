//! Service implementation for the static remote evaluator plugin.

use authz_engine_sdk::{RemoteErrorBody, RemoteEvaluationRequest, RemoteEvaluationResponse};

use crate::config::{EvaluatorMode, StaticEvaluatorConfig};

/// Static remote evaluator.
pub struct Service {
    config: StaticEvaluatorConfig,
}

impl Service {
    #[must_use]
    pub fn new(config: StaticEvaluatorConfig) -> Self {
        Self { config }
    }

    /// Answer `request` from the configured mode.
    #[must_use]
    pub fn evaluate(&self, request: &RemoteEvaluationRequest) -> RemoteEvaluationResponse {
        match self.config.mode {
            EvaluatorMode::AllowAll => RemoteEvaluationResponse::allowed(),
            EvaluatorMode::DenyAll => RemoteEvaluationResponse::denied("deny_all mode"),
            EvaluatorMode::Unavailable => {
                let outage = &self.config.outage;
                RemoteEvaluationResponse::failed(RemoteErrorBody {
                    code: outage.code,
                    dependency: outage.dependency,
                    retry_after_ms: outage.retry_after_ms,
                })
            }
            EvaluatorMode::Grants => {
                let granted = self.config.grants.iter().any(|grant| {
                    grant.privileges.contains(&request.privilege)
                        && request
                            .actor
                            .credentials
                            .iter()
                            .any(|held| grant.credential.matches(held))
                });
                if granted {
                    RemoteEvaluationResponse::allowed()
                } else {
                    RemoteEvaluationResponse::denied(format!(
                        "no static grant for '{}'",
                        request.privilege
                    ))
                }
            }
        }
    }
}
