//! Plugin API trait for remote evaluator implementations.

use async_trait::async_trait;

use crate::remote::{Dependency, RemoteEvaluationRequest, RemoteEvaluationResponse};

/// Failure to obtain any answer from the remote evaluator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteTransportError {
    #[error("remote evaluator unreachable: {message}")]
    Unreachable {
        dependency: Option<Dependency>,
        message: String,
    },

    #[error("malformed remote evaluator response: {0}")]
    Protocol(String),
}

/// Transport to a remote policy decision service.
///
/// An answer carrying an `error` body is returned as `Ok`; the engine
/// classifies it.
#[async_trait]
pub trait RemoteEvaluatorClient: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RemoteTransportError`] when no response could be obtained.
    async fn evaluate(
        &self,
        request: RemoteEvaluationRequest,
    ) -> Result<RemoteEvaluationResponse, RemoteTransportError>;
}
