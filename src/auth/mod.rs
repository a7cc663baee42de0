//! Tower middleware for authentication and permission checks
//!
//! This module wires an [`AuthEngine`](crate::AuthEngine) into an axum
//! application.
//!
//! # Features
//!
//! - `Authenticate` layer validating bearer tokens and attaching the enriched
//!   [`Identity`](crate::identity::Identity) to request extensions
//! - `RequirePermissions` layer evaluating attribute-based or convention-based
//!   requirements for an operation
//!
//! # Example
//!
//! ```ignore
//! use axum::{routing::get, Router};
//! use pep_authz::auth::{Authenticate, RequirePermissions};
//! use pep_authz::authorization::OperationDescriptor;
//! use tower::ServiceBuilder;
//!
//! let app = Router::new()
//!     .route("/orders", get(list_orders).layer(
//!         RequirePermissions::attribute_based(OperationDescriptor::unnamed().with_permission("orders.read")),
//!     ))
//!     .layer(Authenticate::new(engine));
//! ```

pub mod error;
pub mod middleware;

pub use error::AuthorizationError;
pub use middleware::{Authenticate, RequirePermissions};
