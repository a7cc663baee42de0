//! Attaches PDP permissions to a validated identity

use std::sync::Arc;
use tracing;

use crate::error::{AuthzError, Result};
use crate::identity::{claim_types, Identity};
use crate::pdp::PolicyDecisionProvider;

/// Adds the caller's granted permissions as `permissions` claims.
///
/// A missing user id or an unknown user results in an empty permission set;
/// enrichment never fails the request.
pub struct PermissionsClaimsEnricher {
    decisions: Arc<dyn PolicyDecisionProvider>,
    application_name: String,
    user_id_claim_type: String,
}

impl PermissionsClaimsEnricher {
    pub fn new(
        decisions: Arc<dyn PolicyDecisionProvider>,
        application_name: impl Into<String>,
        user_id_claim_type: impl Into<String>,
    ) -> Result<Self> {
        let application_name = application_name.into();
        if application_name.trim().is_empty() {
            return Err(AuthzError::Config("Application name is required".to_string()));
        }
        let user_id_claim_type = user_id_claim_type.into();
        if user_id_claim_type.trim().is_empty() {
            return Err(AuthzError::Config("User id claim type is required".to_string()));
        }
        Ok(Self {
            decisions,
            application_name,
            user_id_claim_type,
        })
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Replace the identity's permission claims with the PDP's current grant
    pub async fn enrich(&self, mut identity: Identity) -> Identity {
        let Some(user_id) = identity.find_first(&self.user_id_claim_type).map(str::to_string) else {
            tracing::warn!(
                "Identity has no {} claim, continuing without permissions",
                self.user_id_claim_type
            );
            identity.replace_claims(claim_types::PERMISSIONS, std::iter::empty::<String>());
            return identity;
        };

        match self.decisions.get_permissions(&user_id, &self.application_name).await {
            Some(response) => {
                identity.replace_claims(claim_types::PERMISSIONS, response.permissions.iter());
            }
            None => {
                tracing::debug!("No permissions granted to {} in {}", user_id, self.application_name);
                identity.replace_claims(claim_types::PERMISSIONS, std::iter::empty::<String>());
            }
        }
        identity
    }
}
