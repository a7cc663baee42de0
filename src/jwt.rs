//! Bearer token validation
//!
//! Signing keys are fetched from a JWKS endpoint (directly, or located through
//! OIDC discovery), cached by [`SigningKeyProvider`], and used by
//! [`TokenSignatureValidator`] to verify inbound tokens.

pub mod types;
pub mod keys;
pub mod validator;

pub use types::*;
pub use keys::*;
pub use validator::*;
