//! Client implementation for the static remote evaluator plugin.

use async_trait::async_trait;
use authz_engine_sdk::{
    RemoteEvaluationRequest, RemoteEvaluationResponse, RemoteEvaluatorClient,
    RemoteTransportError,
};

use super::service::Service;

#[async_trait]
impl RemoteEvaluatorClient for Service {
    async fn evaluate(
        &self,
        request: RemoteEvaluationRequest,
    ) -> Result<RemoteEvaluationResponse, RemoteTransportError> {
        Ok(self.evaluate(&request))
    }
}
