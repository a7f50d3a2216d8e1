//! Bastion Persistence Layer
//!
//! Tenant-scoped data isolation for a multi-tenant backend. Every read and
//! write runs inside a scoped session that confines it to the tenant owning
//! the current request, with a role-granted privileged scope for operators.
//!
//! # Architecture
//!
//! - [`tenant`] - Tenant ids, scopes, the request context and ownership rules
//! - [`isolation`] - Scoped sessions, predicate injection and the store entry point
//! - [`types`] - Stored records, entities and queries
//! - [`core`] - Backend and connection traits
//! - [`backends`] - In-memory and SQLite implementations
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use bastion_persistence::backends::memory::MemoryBackend;
//! use bastion_persistence::error::{StorageError, TenantError};
//! use bastion_persistence::isolation::IsolatedStore;
//! use bastion_persistence::tenant::{RequestContext, TenantId, TenantScope};
//! use bastion_persistence::types::RecordQuery;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = IsolatedStore::new(MemoryBackend::new());
//! let ctx = RequestContext::new().with_correlation_id("req-1");
//! let acme = TenantScope::tenant(1).unwrap();
//!
//! // Records created under a tenant scope are stamped with that tenant.
//! let record = store
//!     .with_scope(&ctx, acme, |mut session| async move {
//!         session.insert("notes", None, None, json!({"title": "hi"})).await
//!     })
//!     .await?;
//! assert_eq!(record.tenant_id(), TenantId::new(1).unwrap());
//!
//! // Another tenant cannot plant records in acme's space.
//! let err = store
//!     .with_scope(&ctx, TenantScope::tenant(2).unwrap(), |mut session| async move {
//!         session
//!             .insert("notes", None, Some(TenantId::new(1).unwrap()), json!({}))
//!             .await
//!     })
//!     .await
//!     .unwrap_err();
//! assert!(matches!(
//!     err,
//!     StorageError::Tenant(TenantError::CrossTenantViolation { .. })
//! ));
//!
//! // Operators see everything.
//! let all = store
//!     .with_scope(&ctx, TenantScope::Privileged, |mut session| async move {
//!         session.find(RecordQuery::new("notes")).await
//!     })
//!     .await?;
//! assert_eq!(all.len(), 1);
//! # Ok::<(), StorageError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod isolation;
pub mod tenant;
pub mod types;

pub use error::{StorageError, StorageResult, TenantError};
pub use isolation::{IsolatedStore, ScopedSession};
pub use tenant::{Owned, RequestContext, TenantId, TenantScope};
pub use types::{Entity, RecordQuery, StoredRecord};

pub use core::{BackendKind, IsolationBackend, IsolationConnection};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
