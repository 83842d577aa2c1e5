//! Authorization Engine Module
//!
//! Aggregates authorization policies along the containment tree, resolves
//! privileges locally or through a remote evaluator guarded by a circuit
//! breaker, and caches decisions keyed by policy versions.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::{AuthzEngineConfig, ConfigError, FallbackMode};
pub use infra::storage::{InMemoryPolicyStore, StoreError};
pub use module::AuthzEngineModule;
