//! Connection-level operations used by scoped sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::tenant::{TenantId, TenantScope};
use crate::types::{RecordQuery, StoredRecord};

/// Owner and version of an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOwnership {
    /// The owning tenant.
    pub owner: TenantId,
    /// The current version.
    pub version: u64,
}

/// An audited change of record owner.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerReassignment {
    /// Collection of the moved record.
    pub collection: String,
    /// Id of the moved record.
    pub id: String,
    /// Previous owner.
    pub from: TenantId,
    /// New owner.
    pub to: TenantId,
    /// The user that requested the change, if known.
    pub actor: Option<String>,
    /// When the change was made.
    pub at: DateTime<Utc>,
}

/// A checked-out connection with a session-level isolation filter.
///
/// The filter is the store-side half of isolation: while it is enabled for
/// `Tenant(T)`, reads and writes issued through the connection only see rows
/// owned by `T`. It is enabled when a scoped session opens and disabled when
/// the session ends, before the connection returns to the pool.
///
/// Reads always go through [`find`](Self::find) with a query that already
/// carries the injected owner predicate, so the filter acts as a second line
/// of defense rather than the only one.
#[async_trait]
pub trait IsolationConnection: Send {
    /// Enables the filter for `scope`.
    ///
    /// Fails with `BackendError::StaleSession` if a filter is already
    /// enabled: a connection that still carries an earlier session's state
    /// must never be silently reused.
    fn enable_filter(&mut self, scope: TenantScope) -> StorageResult<()>;

    /// Disables the filter. Disabling an already disabled filter is a no-op.
    fn disable_filter(&mut self) -> StorageResult<()>;

    /// Returns the scope the filter is enabled for, if any.
    fn active_filter(&self) -> StorageResult<Option<TenantScope>>;

    /// Returns records matching the query, subject to the filter.
    async fn find(&mut self, query: &RecordQuery) -> StorageResult<Vec<StoredRecord>>;

    /// Counts records matching the query, ignoring limit and offset.
    async fn count(&mut self, query: &RecordQuery) -> StorageResult<u64>;

    /// Looks up the owner and version of a record regardless of the filter.
    ///
    /// Only the write path uses this, to tell a foreign record apart from a
    /// missing one before rejecting the write.
    async fn ownership(&mut self, collection: &str, id: &str)
    -> StorageResult<Option<RecordOwnership>>;

    /// Inserts a new record. Fails with `RecordError::AlreadyExists` on an id clash.
    async fn insert(&mut self, record: &StoredRecord) -> StorageResult<()>;

    /// Replaces a record if its owner and version still match.
    ///
    /// Returns `false` when nothing was written because the stored owner or
    /// version moved on.
    async fn replace(&mut self, record: &StoredRecord, expected_version: u64)
    -> StorageResult<bool>;

    /// Removes a record owned by `owner`. Returns `false` if nothing matched.
    async fn remove(&mut self, collection: &str, id: &str, owner: TenantId) -> StorageResult<bool>;

    /// Moves a record to another tenant and records the change.
    ///
    /// Returns `false` when the record no longer has the expected owner.
    async fn reassign(&mut self, change: &OwnerReassignment) -> StorageResult<bool>;
}
