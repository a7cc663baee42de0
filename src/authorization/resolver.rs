//! Required permission resolution

use std::fmt;
use std::str::FromStr;

use crate::error::AuthzError;
use crate::pdp::PermissionSet;

/// Metadata about the protected operation being invoked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// Controller (resource) name used by the naming convention
    pub controller: Option<String>,
    /// Action name used by the naming convention
    pub action: Option<String>,
    /// Primary explicit permission
    pub permission: Option<String>,
    /// Additional explicit permissions
    pub permissions: Vec<String>,
}

impl OperationDescriptor {
    /// Operation identified by controller and action names
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: Some(controller.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Operation with no metadata at all
    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Explicitly declared permissions, blanks dropped
    pub fn explicit_permissions(&self) -> PermissionSet {
        self.permission
            .iter()
            .chain(self.permissions.iter())
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect()
    }

    /// `controller.action`, lower-cased, if both names are present
    pub fn convention_permission(&self) -> Option<String> {
        let controller = self.controller.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let action = self.action.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(format!("{}.{}", controller, action).to_lowercase())
    }
}

/// Which authorization rule a policy applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Explicit permission metadata, falling back to the naming convention
    AttributeBased,
    /// Naming convention only
    ConventionBased,
}

impl Requirement {
    /// Policy name registered for this requirement
    pub fn policy_name(&self) -> &'static str {
        match self {
            Requirement::AttributeBased => "CustomBased",
            Requirement::ConventionBased => "ConventionBased",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.policy_name())
    }
}

impl FromStr for Requirement {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CustomBased" | "AttributeBased" => Ok(Requirement::AttributeBased),
            "ConventionBased" => Ok(Requirement::ConventionBased),
            other => Err(AuthzError::Config(format!("Unknown authorization policy: {}", other))),
        }
    }
}

/// Derives the permissions an operation requires.
///
/// Resolution is a pure function of the descriptor; an empty result means
/// the operation is unrestricted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredPermissionsResolver;

impl RequiredPermissionsResolver {
    pub fn new() -> Self {
        Self
    }

    /// Explicit permissions if any are declared, otherwise the convention
    pub fn resolve(&self, operation: &OperationDescriptor) -> PermissionSet {
        let explicit = operation.explicit_permissions();
        if !explicit.is_empty() {
            return explicit;
        }
        self.resolve_from_convention(operation)
    }

    /// Convention permission only; explicit metadata is ignored
    pub fn resolve_from_convention(&self, operation: &OperationDescriptor) -> PermissionSet {
        operation.convention_permission().into_iter().collect()
    }

    pub fn resolve_for(&self, requirement: Requirement, operation: &OperationDescriptor) -> PermissionSet {
        match requirement {
            Requirement::AttributeBased => self.resolve(operation),
            Requirement::ConventionBased => self.resolve_from_convention(operation),
        }
    }
}
