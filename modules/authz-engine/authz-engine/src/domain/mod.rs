//! Domain layer for the authorization engine.

pub mod aggregator;
pub mod breaker;
pub mod cache;
pub mod error;
pub mod local_client;
pub mod remote;
pub mod repo;
pub mod reset;
pub mod resolver;
pub mod service;

pub use aggregator::{EffectivePolicy, PolicyAggregator};
pub use breaker::{BreakerState, CircuitBreaker};
pub use error::DomainError;
pub use local_client::AuthzEngineLocalClient;
pub use remote::{RemoteEvaluator, RemoteFailure};
pub use repo::{PolicyRepository, PolicyRuleSource};
pub use reset::CurrentRules;
pub use service::Service;
