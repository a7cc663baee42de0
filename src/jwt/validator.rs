//! Bearer token signature and claim validation

use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing;

use crate::error::{AuthzError, Result};
use crate::identity::Identity;
use super::keys::SigningKeyProvider;
use super::types::{SigningKey, TokenValidationOptions};

/// Validates inbound bearer tokens. Every failure is a rejection.
pub struct TokenSignatureValidator {
    keys: Arc<SigningKeyProvider>,
    options: TokenValidationOptions,
}

impl TokenSignatureValidator {
    pub fn new(keys: Arc<SigningKeyProvider>, options: TokenValidationOptions) -> Result<Self> {
        if options.issuer.trim().is_empty() {
            return Err(AuthzError::Config("JWT issuer is required".to_string()));
        }
        if options.audience.trim().is_empty() {
            return Err(AuthzError::Config("JWT audience is required".to_string()));
        }
        Ok(Self { keys, options })
    }

    pub fn options(&self) -> &TokenValidationOptions {
        &self.options
    }

    /// Verify `token` and return the caller's identity
    pub async fn validate(&self, token: &str) -> Result<Identity> {
        let header = decode_header(token)
            .map_err(|e| AuthzError::TokenValidation(format!("Invalid token header: {}", e)))?;

        let kid = header.kid
            .ok_or_else(|| AuthzError::TokenValidation("Token missing kid in header".to_string()))?;

        let key = self.find_key(&kid).await?;

        if header.alg != key.algorithm {
            return Err(AuthzError::TokenValidation(format!(
                "Token algorithm {:?} does not match key algorithm {:?} for kid {}",
                header.alg, key.algorithm, kid
            )));
        }

        tracing::debug!("Validating token with kid: {}, algorithm: {:?}", kid, key.algorithm);

        let mut validation = Validation::new(key.algorithm);
        validation.set_issuer(&[&self.options.issuer]);
        validation.set_audience(&[&self.options.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.options.leeway.as_secs();

        let token_data = decode::<Map<String, Value>>(token, &key.key, &validation)
            .map_err(|e| AuthzError::TokenValidation(format!("Token validation failed: {}", e)))?;

        Ok(Identity::from_jwt_claims(&token_data.claims))
    }

    /// Look up `kid`, re-fetching the key set once if it is unknown
    async fn find_key(&self, kid: &str) -> Result<SigningKey> {
        let keys = self.keys
            .get_keys()
            .await
            .map_err(|e| AuthzError::TokenValidation(format!("Signing keys unavailable: {}", e)))?;
        if let Some(key) = keys.get(kid) {
            return Ok(key.clone());
        }

        let keys = self.keys
            .refresh_for_unknown_key(kid)
            .await
            .map_err(|e| AuthzError::TokenValidation(format!("No key found for kid {}: {}", kid, e)))?;
        keys.get(kid)
            .cloned()
            .ok_or_else(|| AuthzError::TokenValidation(format!("No key found for kid: {}", kid)))
    }
}
