//! HTTP middleware for the Bastion REST API.
//!
//! - [`gate`] - Caller resolution and scope decision for business routes

pub mod gate;

pub use gate::{GrantedScope, X_REQUEST_ID, X_TENANT_ID, access_gate};
