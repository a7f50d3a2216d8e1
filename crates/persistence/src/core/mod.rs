//! Core storage traits.
//!
//! - [`IsolationBackend`] - Hands out pooled connections
//! - [`IsolationConnection`] - Record operations plus the session-level
//!   isolation filter toggle
//!
//! Application code does not use these directly; it goes through
//! [`IsolatedStore`](crate::isolation::IsolatedStore), which binds a scope,
//! enables the filter and validates every write before calling down.

mod backend;
mod connection;

pub use backend::{BackendKind, IsolationBackend};
pub use connection::{IsolationConnection, OwnerReassignment, RecordOwnership};
