//! Permission-based authorization
//!
//! An operation's required permissions come from an [`OperationDescriptor`]
//! built by the host: either explicit permission metadata or the
//! controller/action names used by the naming convention. The
//! [`PermissionsAuthorizationHandler`] compares them against the permission
//! claims of the caller.
//!
//! # Example
//!
//! ```rust
//! use pep_authz::authorization::{
//!     OperationDescriptor, PermissionsAuthorizationHandler, Requirement, Verdict,
//! };
//! use pep_authz::identity::{claim_types, Identity};
//!
//! let handler = PermissionsAuthorizationHandler::default();
//! let operation = OperationDescriptor::new("Orders", "Read");
//! let caller = Identity::new("Bearer").with_claim(claim_types::PERMISSIONS, "orders.read");
//!
//! let verdict = handler.handle(Requirement::ConventionBased, &operation, &caller);
//! assert_eq!(verdict, Verdict::Succeeded);
//! ```

pub mod resolver;
pub mod handler;

pub use resolver::*;
pub use handler::*;
