//! Tenant scoping for multi-tenant storage.
//!
//! # Core Types
//!
//! - [`TenantId`] - Positive tenant identifier
//! - [`TenantScope`] - Either one tenant or the privileged operator scope
//! - [`RequestContext`] - Explicit per-request context holding the active scope
//! - [`ScopeGuard`] - Releases a binding when dropped
//! - [`Owned`] - Implemented by every tenant-owned entity
//!
//! # Examples
//!
//! ```
//! use bastion_persistence::tenant::{RequestContext, TenantScope};
//!
//! let mut ctx = RequestContext::new().with_user_id("alice");
//! let guard = ctx.bind(TenantScope::tenant(1).unwrap()).unwrap();
//! assert!(guard.current().is_some());
//! drop(guard);
//! assert!(ctx.current().is_none());
//! ```

mod context;
mod id;
pub mod ownership;
mod scope;

pub use context::{RequestContext, ScopeGuard};
pub use id::TenantId;
pub use ownership::Owned;
pub use scope::TenantScope;
