//! Axum integration
//!
//! This module provides utilities for integrating the engine with the Axum
//! web framework:
//! - Bearer token extraction from request headers
//! - `FromRequestParts` extractor for the caller's [`Identity`]
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{routing::get, Router};
//! use pep_authz::axum_integration::IdentityExtractor;
//!
//! async fn protected_handler(identity: IdentityExtractor) -> String {
//!     format!("Hello, {}!", identity.find_first("sub").unwrap_or("stranger"))
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler));
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use std::ops::Deref;

use crate::identity::Identity;

/// Extract Bearer token from Authorization header
///
/// # Example
///
/// ```rust
/// use axum::http::HeaderMap;
/// use pep_authz::axum_integration::extract_bearer_token;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("Authorization", "Bearer my-token".parse().unwrap());
///
/// let token = extract_bearer_token(&headers);
/// assert_eq!(token, Some("my-token".to_string()));
/// ```
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

/// Axum extractor for the authenticated caller.
///
/// The identity is inserted by the `Authenticate` middleware; handlers
/// reached without one are rejected with 401.
#[derive(Debug, Clone)]
pub struct IdentityExtractor(pub Identity);

impl Deref for IdentityExtractor {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Identity> for IdentityExtractor {
    fn from(identity: Identity) -> Self {
        Self(identity)
    }
}

impl IdentityExtractor {
    /// Get the inner Identity
    pub fn into_inner(self) -> Identity {
        self.0
    }
}

impl<S> FromRequestParts<S> for IdentityExtractor
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .filter(|identity| identity.is_authenticated())
            .cloned()
            .map(IdentityExtractor)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
