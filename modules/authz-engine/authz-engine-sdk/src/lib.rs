#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authorization Engine SDK
//!
//! This crate provides the public API for the `authz_engine` module:
//!
//! - [`AuthzEngineClient`] - Public API trait for consumers
//! - [`RemoteEvaluatorClient`] - Plugin API trait for remote evaluators
//! - [`AuthorizationPolicy`], [`CredentialRule`], [`PrivilegeRule`],
//!   [`VerifiedCredentialRule`] - Rule model
//! - [`Privilege`], [`ResourceType`] - Closed vocabularies
//! - [`Decision`], [`RuleRef`] - Evaluation results
//! - [`AuthzEngineError`] - Error types
//! - [`pep`] - PEP helpers ([`PolicyEnforcer`], [`OperationRequirements`])
//!
//! ## Usage
//!
//! ```ignore
//! use authz_engine_sdk::{
//!     AuthzEngineClient, Privilege, ResourceRef, ResourceType,
//!     pep::{OperationRequirements, PolicyEnforcer},
//! };
//!
//! let enforcer = PolicyEnforcer::new(engine).with_operations(
//!     OperationRequirements::new()
//!         .require("space.read", Privilege::Read)
//!         .require("space.update", Privilege::Update),
//! );
//!
//! let space = ResourceRef::new(space_id, ResourceType::Space);
//! enforcer.enforce(&actor, &space, Privilege::Read).await?;
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod pep;
pub mod plugin_api;
pub mod policy;
pub mod privilege;
pub mod remote;
pub mod rules;

// Re-export main types at crate root
pub use api::AuthzEngineClient;
pub use error::AuthzEngineError;
pub use models::{Decision, DecisionSource, DenyReason, ResourceRef, RuleKind, RuleRef, deny_codes};
pub use pep::{DuplicateOperation, EnforcerError, OperationRequirements, PolicyEnforcer};
pub use plugin_api::{RemoteEvaluatorClient, RemoteTransportError};
pub use policy::{AuthorizationPolicy, PolicyId, PolicyRules, PolicyValidationError};
pub use privilege::{Privilege, ResourceType, UnknownName};
pub use remote::{
    ActorSummary, Dependency, ErrorCode, RemoteErrorBody, RemoteEvaluationRequest,
    RemoteEvaluationResponse,
};
pub use rules::{ClaimConstraint, CredentialRule, PrivilegeRule, VerifiedCredentialRule};

pub use authz_security::{
    ActorContext, CredentialDefinition, CredentialKey, CredentialType, ResourceId,
    VerifiedCredential,
};
