//! Common types for token validation

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, time::Duration};
use tokio::time::Instant;

/// OIDC discovery document (only the fields needed to locate keys)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    /// Issuer identifier
    pub issuer: String,
    /// JWKS URI
    pub jwks_uri: String,
}

/// A verification key and the algorithm it is used with
#[derive(Clone)]
pub struct SigningKey {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
}

/// Verification keys by key id.
///
/// A set is replaced wholesale on refresh, never modified.
#[derive(Clone)]
pub struct SigningKeySet {
    pub keys: HashMap<String, SigningKey>,
    /// When the set was fetched
    pub refreshed_at: Instant,
}

impl SigningKeySet {
    pub fn new(keys: HashMap<String, SigningKey>) -> Self {
        Self {
            keys,
            refreshed_at: Instant::now(),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }
}

impl fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<_> = self.keys
            .iter()
            .map(|(kid, key)| format!("{}:{:?}", kid, key.algorithm))
            .collect();
        kids.sort();
        f.debug_struct("SigningKeySet")
            .field("keys", &kids)
            .field("refreshed_at", &self.refreshed_at)
            .finish()
    }
}

/// Expected values for inbound tokens
#[derive(Debug, Clone)]
pub struct TokenValidationOptions {
    /// Required `iss` value
    pub issuer: String,
    /// Value that must appear in `aud`
    pub audience: String,
    /// Clock skew tolerated on `exp`/`nbf`
    pub leeway: Duration,
}

impl TokenValidationOptions {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: Duration::ZERO,
        }
    }
}

/// Signing key cache policy
#[derive(Debug, Clone)]
pub struct KeyProviderOptions {
    /// Age after which the cached set is re-fetched
    pub refresh_interval: Duration,
    /// Minimum age before an unknown key id may force a re-fetch
    pub refresh_cooldown: Duration,
}

impl Default for KeyProviderOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(3600),
            refresh_cooldown: Duration::from_secs(10),
        }
    }
}
