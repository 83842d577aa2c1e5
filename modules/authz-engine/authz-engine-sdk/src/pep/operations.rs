//! Declarative privilege requirements for API operations.

use std::collections::HashMap;

use crate::privilege::Privilege;

/// An operation id was registered twice with different privileges.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation '{operation}' already requires '{existing}'")]
pub struct DuplicateOperation {
    pub operation: String,
    pub existing: Privilege,
}

/// Registration table mapping operation ids to the privilege they require.
///
/// Built once at startup next to the handler registrations:
///
/// ```ignore
/// let ops = OperationRequirements::new()
///     .require("space.update", Privilege::Update)
///     .require("space.delete", Privilege::Delete);
/// ```
///
/// Operations missing from the table are rejected by
/// [`super::PolicyEnforcer::intercept`].
#[derive(Debug, Clone, Default)]
pub struct OperationRequirements {
    by_operation: HashMap<String, Privilege>,
}

impl OperationRequirements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::register`]; a later entry for the same id wins.
    #[must_use]
    pub fn require(mut self, operation: impl Into<String>, privilege: Privilege) -> Self {
        self.by_operation.insert(operation.into(), privilege);
        self
    }

    /// Register `operation`. Re-registering with the same privilege is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateOperation`] if the id already requires another privilege.
    pub fn register(
        &mut self,
        operation: impl Into<String>,
        privilege: Privilege,
    ) -> Result<(), DuplicateOperation> {
        let operation = operation.into();
        match self.by_operation.get(&operation) {
            Some(&existing) if existing != privilege => {
                Err(DuplicateOperation { operation, existing })
            }
            Some(_) => Ok(()),
            None => {
                self.by_operation.insert(operation, privilege);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn required_privilege(&self, operation: &str) -> Option<Privilege> {
        self.by_operation.get(operation).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_operation.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_operation.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_registered_privilege() {
        let ops = OperationRequirements::new()
            .require("space.update", Privilege::Update)
            .require("space.read", Privilege::Read);

        assert_eq!(ops.required_privilege("space.update"), Some(Privilege::Update));
        assert_eq!(ops.required_privilege("space.archive"), None);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let mut ops = OperationRequirements::new();
        ops.register("callout.create", Privilege::Create).unwrap();
        ops.register("callout.create", Privilege::Create).unwrap();

        let err = ops
            .register("callout.create", Privilege::Contribute)
            .unwrap_err();
        assert_eq!(err.existing, Privilege::Create);
        assert_eq!(ops.required_privilege("callout.create"), Some(Privilege::Create));
    }
}
