#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Actor context and credential vocabulary.
//!
//! - [`ActorContext`] - the already-authenticated caller, read-only inside the engine
//! - [`CredentialDefinition`], [`CredentialType`] - locally issued grants
//! - [`VerifiedCredential`] - grants asserted by external issuers
pub mod context;
pub mod credential;

pub use context::{ActorContext, ActorContextBuilder, CredentialKey};
pub use credential::{
    CredentialDefinition, CredentialParseError, CredentialType, ResourceId, UnknownCredentialType,
    VerifiedCredential,
};
