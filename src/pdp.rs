//! Policy Decision Point access
//!
//! The PDP is the external authority that knows which permissions a user holds
//! within an application. This module provides the HTTP transport, the
//! response cache and the caching client that ties them together.

pub mod types;
pub mod cache;
pub mod client;

pub use types::*;
pub use cache::*;
pub use client::*;
