//! Tenant isolation for store access.
//!
//! Isolation is enforced in two layers:
//!
//! 1. **Predicate injection**: [`scope_query`] ANDs an owner predicate into
//!    every read while a tenant scope is bound, and the write path in
//!    [`ScopedSession`] checks every create, update and delete against the
//!    ownership rules before it is issued.
//! 2. **Connection filter**: each pooled connection carries a session-level
//!    filter, enabled when a session opens and disabled when it closes.
//!    Backends apply it inside the store, so a query that somehow escaped
//!    the first layer still cannot see another tenant's rows.
//!
//! All access goes through [`IsolatedStore::with_scope`]:
//!
//! ```text
//! bind scope -> acquire connection -> enable filter -> op(session)
//!                                                         |
//!   check in connection <- release scope <- disable filter (on drop)
//! ```

mod audit;
mod filter;
mod session;
mod store;

pub use audit::AUDIT_TARGET;
pub use filter::scope_query;
pub use session::ScopedSession;
pub use store::IsolatedStore;
