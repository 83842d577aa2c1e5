//! PEP (Policy Enforcement Point) helpers.
//!
//! - [`PolicyEnforcer`]: enforce / resolve / intercept on top of an [`crate::AuthzEngineClient`]
//! - [`OperationRequirements`]: operation id → required privilege table

pub mod enforcer;
pub mod operations;

pub use enforcer::{EnforcerError, PolicyEnforcer};
pub use operations::{DuplicateOperation, OperationRequirements};
