//! Remote evaluation behind the circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use authz_engine_sdk::{
    ActorContext, ActorSummary, Decision, DecisionSource, Dependency, DenyReason, ErrorCode,
    Privilege, RemoteErrorBody, RemoteEvaluationRequest, RemoteEvaluatorClient,
    RemoteTransportError, ResourceRef, deny_codes,
};
use tracing::{debug, warn};

use super::breaker::{BreakerOpen, BreakerState, CircuitBreaker};
use super::error::DomainError;
use crate::config::RemoteConfig;

/// Why the remote evaluator produced no decision.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteFailure {
    #[error("circuit breaker open, retry in {retry_after_ms}ms")]
    BreakerOpen { retry_after_ms: u64 },

    #[error("remote evaluation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(#[from] RemoteTransportError),

    #[error("remote evaluator reported {}", .0.code)]
    ErrorBody(RemoteErrorBody),
}

impl RemoteFailure {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BreakerOpen { .. } => ErrorCode::CircuitBreakerOpen,
            Self::Timeout(_) | Self::Transport(_) => ErrorCode::DependencyUnavailable,
            Self::ErrorBody(body) => body.code,
        }
    }

    #[must_use]
    pub fn dependency(&self) -> Option<Dependency> {
        match self {
            Self::BreakerOpen { .. }
            | Self::Timeout(_)
            | Self::Transport(RemoteTransportError::Protocol(_)) => None,
            Self::Transport(RemoteTransportError::Unreachable { dependency, .. }) => *dependency,
            Self::ErrorBody(body) => body.dependency.or(match body.code {
                ErrorCode::NatsUnavailable => Some(Dependency::Nats),
                ErrorCode::CircuitBreakerOpen | ErrorCode::DependencyUnavailable => None,
            }),
        }
    }

    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::BreakerOpen { retry_after_ms } => Some(*retry_after_ms),
            Self::ErrorBody(body) => body.retry_after_ms,
            Self::Timeout(_) | Self::Transport(_) => None,
        }
    }
}

impl From<BreakerOpen> for RemoteFailure {
    fn from(open: BreakerOpen) -> Self {
        Self::BreakerOpen {
            retry_after_ms: open.retry_after_ms,
        }
    }
}

impl From<RemoteFailure> for DomainError {
    fn from(failure: RemoteFailure) -> Self {
        Self::RemoteUnavailable {
            code: failure.code(),
            dependency: failure.dependency(),
            retry_after_ms: failure.retry_after_ms(),
        }
    }
}

/// Remote evaluator client wrapped in a timeout and a circuit breaker.
pub struct RemoteEvaluator {
    client: Arc<dyn RemoteEvaluatorClient>,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl RemoteEvaluator {
    #[must_use]
    pub fn new(client: Arc<dyn RemoteEvaluatorClient>, config: &RemoteConfig) -> Self {
        Self {
            client,
            breaker: CircuitBreaker::new(config.breaker.clone(), config.timeout),
            timeout: config.timeout,
        }
    }

    #[must_use]
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Ask the remote evaluator for a decision.
    ///
    /// An explicit refusal is a decision and counts as a healthy call.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteFailure`] when the breaker is open, the call times out,
    /// the transport fails or the evaluator answers with an error body.
    pub async fn evaluate(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
        privilege: Privilege,
    ) -> Result<Decision, RemoteFailure> {
        let permit = self.breaker.try_acquire().inspect_err(|open| {
            debug!(
                resource = %resource,
                retry_after_ms = open.retry_after_ms,
                "remote evaluation short-circuited by open breaker"
            );
        })?;

        let request = RemoteEvaluationRequest {
            actor: ActorSummary::from(actor),
            resource_id: resource.id,
            resource_type: resource.resource_type,
            privilege,
        };

        let outcome = match tokio::time::timeout(self.timeout, self.client.evaluate(request)).await {
            Err(_) => Err(RemoteFailure::Timeout(self.timeout)),
            Ok(Err(e)) => Err(RemoteFailure::Transport(e)),
            Ok(Ok(response)) => match response.error {
                Some(body) => Err(RemoteFailure::ErrorBody(body)),
                None => Ok(response),
            },
        };

        match outcome {
            Ok(response) => {
                permit.success();
                if response.allowed {
                    Ok(Decision::allow(privilege, DecisionSource::Remote))
                } else {
                    let mut reason = DenyReason::new(deny_codes::REMOTE_DENIED);
                    if let Some(details) = response.reason {
                        reason = reason.with_details(details);
                    }
                    Ok(Decision::deny(privilege, DecisionSource::Remote, reason))
                }
            }
            Err(failure) => {
                permit.failure();
                warn!(
                    resource = %resource,
                    %privilege,
                    code = %failure.code(),
                    error = %failure,
                    "remote evaluation failed"
                );
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use authz_engine_sdk::{RemoteEvaluationResponse, ResourceId, ResourceType};

    use super::*;
    use crate::config::BreakerConfig;

    struct Scripted {
        response: RemoteEvaluationResponse,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteEvaluatorClient for Scripted {
        async fn evaluate(
            &self,
            _request: RemoteEvaluationRequest,
        ) -> Result<RemoteEvaluationResponse, RemoteTransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn evaluator(response: RemoteEvaluationResponse) -> (RemoteEvaluator, Arc<Scripted>) {
        evaluator_with(response, BreakerConfig::default())
    }

    fn evaluator_with(
        response: RemoteEvaluationResponse,
        breaker: BreakerConfig,
    ) -> (RemoteEvaluator, Arc<Scripted>) {
        let client = Arc::new(Scripted {
            response,
            calls: AtomicUsize::new(0),
        });
        let config = RemoteConfig {
            enabled: true,
            resource_types: vec![ResourceType::Space],
            breaker,
            ..RemoteConfig::default()
        };
        (RemoteEvaluator::new(client.clone(), &config), client)
    }

    fn unavailable() -> RemoteEvaluationResponse {
        RemoteEvaluationResponse::failed(RemoteErrorBody {
            code: ErrorCode::DependencyUnavailable,
            dependency: Some(Dependency::Database),
            retry_after_ms: None,
        })
    }

    fn space() -> ResourceRef {
        ResourceRef::new(ResourceId::new_v4(), ResourceType::Space)
    }

    #[tokio::test]
    async fn refusal_is_a_decision_not_a_failure() {
        let (remote, _) = evaluator(RemoteEvaluationResponse::denied("not a member"));
        for _ in 0..10 {
            let decision = remote
                .evaluate(&ActorContext::anonymous(), &space(), Privilege::Update)
                .await
                .unwrap();
            assert!(!decision.granted);
            assert_eq!(decision.source, DecisionSource::Remote);
            let reason = decision.deny_reason.unwrap();
            assert_eq!(reason.error_code, deny_codes::REMOTE_DENIED);
            assert_eq!(reason.details.as_deref(), Some("not a member"));
        }
        assert_eq!(remote.breaker_state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn error_body_surfaces_dependency_and_hint() {
        let (remote, _) = evaluator(RemoteEvaluationResponse::failed(RemoteErrorBody {
            code: ErrorCode::NatsUnavailable,
            dependency: None,
            retry_after_ms: Some(1_500),
        }));

        let failure = remote
            .evaluate(&ActorContext::anonymous(), &space(), Privilege::Read)
            .await
            .unwrap_err();
        assert_eq!(failure.code(), ErrorCode::NatsUnavailable);
        assert_eq!(failure.dependency(), Some(Dependency::Nats));
        assert_eq!(failure.retry_after_ms(), Some(1_500));
    }

    #[tokio::test]
    async fn failures_open_the_breaker_and_skip_the_network() {
        let (remote, client) = evaluator(unavailable());

        for _ in 0..5 {
            let _ = remote
                .evaluate(&ActorContext::anonymous(), &space(), Privilege::Read)
                .await;
        }
        assert_eq!(remote.breaker_state(), BreakerState::Open);

        let failure = remote
            .evaluate(&ActorContext::anonymous(), &space(), Privilege::Read)
            .await
            .unwrap_err();
        assert_eq!(failure.code(), ErrorCode::CircuitBreakerOpen);
        assert!(failure.retry_after_ms().is_some());
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn disabled_breaker_calls_through_every_time() {
        let (remote, client) = evaluator_with(
            unavailable(),
            BreakerConfig {
                enabled: false,
                ..BreakerConfig::default()
            },
        );

        for _ in 0..10 {
            let failure = remote
                .evaluate(&ActorContext::anonymous(), &space(), Privilege::Read)
                .await
                .unwrap_err();
            assert_eq!(failure.code(), ErrorCode::DependencyUnavailable);
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 10);
        assert_eq!(remote.breaker_state(), BreakerState::Closed);
    }
}
