//! Error types for the persistence layer.
//!
//! Isolation failures live in [`TenantError`] and are kept distinct from
//! ordinary record, concurrency and backend failures so callers can map them
//! to authorization responses rather than generic server errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::tenant::{TenantId, TenantScope};

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Tenant isolation errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Record state errors
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Concurrency and versioning errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Returns the tenant isolation error, if this is one.
    pub fn as_tenant(&self) -> Option<&TenantError> {
        match self {
            StorageError::Tenant(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised by the tenant isolation layer.
///
/// None of these are retried or downgraded inside the core; they propagate
/// unchanged to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// A tenant identifier was zero, negative or not a number.
    #[error("invalid tenant scope: '{value}' is not a positive tenant id")]
    InvalidScope { value: String },

    /// A scope was bound while another binding was still active.
    #[error("tenant scope already bound ({current})")]
    AlreadyBound { current: TenantScope },

    /// Store access was attempted without any scope bound.
    #[error("unscoped store access rejected: {operation}")]
    UnscopedAccess { operation: String },

    /// A write would create or touch a record owned by another tenant.
    #[error(
        "cross-tenant write rejected: {scope} cannot write {collection}/{id} owned by tenant {owner}"
    )]
    CrossTenantViolation {
        scope: TenantId,
        owner: TenantId,
        collection: String,
        id: String,
    },

    /// An update disagrees with the stored owner of the record.
    #[error("tenant mismatch on {collection}/{id}: stored owner {expected}, got {actual}")]
    TenantMismatch {
        collection: String,
        id: String,
        expected: TenantId,
        actual: TenantId,
    },

    /// A privileged create did not name an owning tenant.
    #[error("cannot create {collection} record without an owning tenant")]
    MissingTenant { collection: String },

    /// Owner reassignment attempted outside the privileged scope.
    #[error("reassigning the owner of {collection}/{id} requires the privileged scope")]
    ReassignmentNotPermitted { collection: String, id: String },
}

impl TenantError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TenantError::InvalidScope { .. } => "invalid-scope",
            TenantError::AlreadyBound { .. } => "already-bound",
            TenantError::UnscopedAccess { .. } => "unscoped-access",
            TenantError::CrossTenantViolation { .. } => "cross-tenant-violation",
            TenantError::TenantMismatch { .. } => "tenant-mismatch",
            TenantError::MissingTenant { .. } => "missing-tenant",
            TenantError::ReassignmentNotPermitted { .. } => "reassignment-not-permitted",
        }
    }

    /// Returns true for errors that indicate an attempted isolation breach
    /// rather than a malformed request.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            TenantError::UnscopedAccess { .. }
                | TenantError::CrossTenantViolation { .. }
                | TenantError::TenantMismatch { .. }
                | TenantError::ReassignmentNotPermitted { .. }
        )
    }
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The requested record was not found (or is not visible in this scope).
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A record with the given id already exists.
    #[error("record already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },
}

/// Errors related to concurrent modification.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The record changed between read and write.
    #[error("version conflict on {collection}/{id}: expected {expected_version}, found {actual_version}")]
    VersionConflict {
        collection: String,
        id: String,
        expected_version: u64,
        actual_version: u64,
    },
}

/// Errors related to record validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The record payload is not acceptable.
    #[error("invalid {collection} record: {message}")]
    InvalidRecord { collection: String, message: String },

    /// A query field name is not usable.
    #[error("invalid query field: {field}")]
    InvalidField { field: String },

    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// A pooled connection still carried isolation state from an earlier use.
    #[error("stale isolation state on {backend_name} connection (active: {active})")]
    StaleSession {
        backend_name: String,
        active: TenantScope,
    },

    /// The store-level isolation filter refused a write that passed the
    /// application checks.
    #[error("{backend_name} isolation filter rejected {operation}")]
    FilterRejected {
        backend_name: String,
        operation: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for scope and ownership checks.
pub type TenantResult<T> = Result<T, TenantError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
