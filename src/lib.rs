//! # pep-authz - permission-based authorization backed by a PDP
//!
//! Decides, per request, whether an authenticated caller holds the
//! permissions a protected operation requires.
//!
//! - [`jwt`]: bearer token validation against a cached JWKS
//! - [`pdp`]: cached permission lookups against an external Policy Decision Point
//! - [`enricher`]: attaches granted permissions to the caller's identity
//! - [`authorization`]: required-permission resolution and evaluation
//! - [`engine`]: wires everything together from [`config::AuthConfig`]
//!
//! ## Features
//!
//! - `axum` (default): tower layers and extractors for axum hosts

pub mod error;
pub use error::{AuthzError, Result};

pub mod config;
pub mod identity;
pub mod jwt;
pub mod pdp;
pub mod enricher;
pub mod authorization;
pub mod engine;

#[cfg(feature = "axum")]
pub mod auth;

#[cfg(feature = "axum")]
pub mod axum_integration;

// Re-export commonly used types at crate root
pub use crate::authorization::{OperationDescriptor, Requirement, Verdict};
pub use crate::config::{AuthConfig, Settings};
pub use crate::engine::AuthEngine;
pub use crate::identity::{Claim, Identity};
pub use crate::pdp::{PdpResponse, PermissionSet};
