//! Component wiring
//!
//! [`AuthEngine`] owns one instance of every component for the lifetime of
//! the host process: the signing key cache, the token validator, the PDP
//! client with its permission cache, the claims enricher and the
//! authorization handler.

use std::sync::Arc;
use tracing;

use crate::authorization::{OperationDescriptor, PermissionsAuthorizationHandler, Requirement, Verdict};
use crate::config::AuthConfig;
use crate::enricher::PermissionsClaimsEnricher;
use crate::error::{AuthzError, Result};
use crate::identity::Identity;
use crate::jwt::{HttpKeySource, SigningKeyProvider, TokenSignatureValidator};
use crate::pdp::{HttpPdpTransport, MemoryPermissionCache, PolicyDecisionClient};

/// Authentication and authorization entry point
#[derive(Clone)]
pub struct AuthEngine {
    validator: Arc<TokenSignatureValidator>,
    enricher: Arc<PermissionsClaimsEnricher>,
    handler: PermissionsAuthorizationHandler,
}

impl AuthEngine {
    pub fn new(
        validator: Arc<TokenSignatureValidator>,
        enricher: Arc<PermissionsClaimsEnricher>,
        handler: PermissionsAuthorizationHandler,
    ) -> Self {
        Self { validator, enricher, handler }
    }

    /// Build every component from configuration.
    ///
    /// Nothing is fetched here; keys and permissions are loaded on first use.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        config.validate()?;

        let key_source = HttpKeySource::new(config.key_location());
        let keys = SigningKeyProvider::new(Arc::new(key_source), config.to_key_provider_options());
        let validator = TokenSignatureValidator::new(Arc::new(keys), config.to_token_validation_options())?;

        let pdp_options = config.to_pdp_options();
        let transport = HttpPdpTransport::new(&pdp_options)?;
        let pdp = PolicyDecisionClient::builder()
            .cache(Arc::new(MemoryPermissionCache::new()))
            .options(pdp_options)
            .transport(Arc::new(transport))
            .build()?;

        let enricher = PermissionsClaimsEnricher::new(
            Arc::new(pdp),
            config.application_name.clone(),
            config.jwt_user_id_claim_type.clone(),
        )?;

        tracing::debug!(
            "Authorization engine configured for application {} with PDP {}",
            config.application_name, config.pdp_url
        );

        Ok(Self::new(
            Arc::new(validator),
            Arc::new(enricher),
            PermissionsAuthorizationHandler::default(),
        ))
    }

    /// Validate a bearer token and attach the caller's permissions
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        let identity = self.validator.validate(token).await?;
        Ok(self.enricher.enrich(identity).await)
    }

    pub fn authorize(&self, requirement: Requirement, operation: &OperationDescriptor, identity: &Identity) -> Verdict {
        self.handler.handle(requirement, operation, identity)
    }

    /// `Ok(())` when every requirement succeeds, otherwise the first unmet one
    pub fn check(
        &self,
        requirements: &[Requirement],
        operation: &OperationDescriptor,
        identity: &Identity,
    ) -> Result<()> {
        if !identity.is_authenticated() {
            return Err(AuthzError::AuthenticationRequired);
        }
        for requirement in requirements {
            let context = self.handler.context(*requirement, operation, identity);
            if !self.handler.handle_context(&context).has_succeeded() {
                return Err(AuthzError::AuthorizationDenied(format!(
                    "{} requires {}",
                    requirement,
                    context.missing_permissions().join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn validator(&self) -> &TokenSignatureValidator {
        &self.validator
    }

    pub fn enricher(&self) -> &PermissionsClaimsEnricher {
        &self.enricher
    }

    pub fn handler(&self) -> &PermissionsAuthorizationHandler {
        &self.handler
    }
}
