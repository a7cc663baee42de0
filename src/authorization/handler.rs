//! Authorization requirement evaluation

use tracing;

use crate::identity::Identity;
use crate::pdp::PermissionSet;
use super::resolver::{OperationDescriptor, RequiredPermissionsResolver, Requirement};

/// Outcome of evaluating one requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    /// The requirement was not met; aggregation denies by absence of success
    Abstained,
}

impl Verdict {
    pub fn has_succeeded(&self) -> bool {
        matches!(self, Verdict::Succeeded)
    }
}

/// Inputs for a single evaluation
#[derive(Debug, Clone)]
pub struct AuthorizationContext<'a> {
    pub requirement: Requirement,
    pub required: PermissionSet,
    pub identity: &'a Identity,
}

impl AuthorizationContext<'_> {
    /// Required permissions the identity does not hold
    pub fn missing_permissions(&self) -> Vec<String> {
        let granted = self.identity.permissions();
        self.required
            .missing_from(&granted)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Evaluates permission requirements against an identity's permission claims
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionsAuthorizationHandler {
    resolver: RequiredPermissionsResolver,
}

impl PermissionsAuthorizationHandler {
    pub fn new(resolver: RequiredPermissionsResolver) -> Self {
        Self { resolver }
    }

    /// Resolve what `operation` requires under `requirement`
    pub fn context<'a>(
        &self,
        requirement: Requirement,
        operation: &OperationDescriptor,
        identity: &'a Identity,
    ) -> AuthorizationContext<'a> {
        AuthorizationContext {
            requirement,
            required: self.resolver.resolve_for(requirement, operation),
            identity,
        }
    }

    /// Succeeded when nothing is required or every required permission is granted
    pub fn handle_context(&self, context: &AuthorizationContext<'_>) -> Verdict {
        if context.required.is_empty() {
            return Verdict::Succeeded;
        }

        let granted = context.identity.permissions();
        if context.required.is_subset(&granted) {
            Verdict::Succeeded
        } else {
            tracing::debug!(
                "{} requirement not met, missing permissions: {:?}",
                context.requirement,
                context.required.missing_from(&granted)
            );
            Verdict::Abstained
        }
    }

    pub fn handle(&self, requirement: Requirement, operation: &OperationDescriptor, identity: &Identity) -> Verdict {
        self.handle_context(&self.context(requirement, operation, identity))
    }

    /// True when every requirement succeeds
    pub fn evaluate(&self, requirements: &[Requirement], operation: &OperationDescriptor, identity: &Identity) -> bool {
        requirements
            .iter()
            .all(|requirement| self.handle(*requirement, operation, identity).has_succeeded())
    }
}
