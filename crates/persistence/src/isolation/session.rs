//! Scoped sessions: one connection, one bound scope.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use super::audit;
use super::filter::scope_query;
use crate::core::{IsolationConnection, OwnerReassignment, RecordOwnership};
use crate::error::{
    ConcurrencyError, RecordError, StorageError, StorageResult, TenantError, ValidationError,
};
use crate::tenant::{RequestContext, TenantId, TenantScope, ownership};
use crate::types::{Entity, RecordQuery, StoredRecord};

/// A checked-out connection with a bound scope and an enabled filter.
///
/// Sessions are created by [`IsolatedStore`](super::IsolatedStore) and
/// handed to the operation by value. Every read is scoped with
/// [`scope_query`] and every write is checked against the ownership rules
/// before it reaches the connection.
///
/// Dropping the session disables the connection filter, releases the scope
/// and returns the connection to its pool. Because this happens in `Drop`,
/// it also happens when the operation fails or when the future running it is
/// cancelled.
pub struct ScopedSession<C: IsolationConnection> {
    context: RequestContext,
    connection: C,
    backend_name: &'static str,
}

impl<C: IsolationConnection> ScopedSession<C> {
    /// Enables the filter for the context's binding and wraps the connection.
    pub(crate) fn open(
        context: RequestContext,
        mut connection: C,
        backend_name: &'static str,
    ) -> StorageResult<Self> {
        let scope = context.require_for_write("open session")?;
        connection.enable_filter(scope)?;
        debug!(
            backend = backend_name,
            correlation_id = context.correlation_id(),
            scope = %scope,
            "Isolation filter enabled"
        );
        Ok(Self {
            context,
            connection,
            backend_name,
        })
    }

    /// Returns the session's request context.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Returns the bound scope.
    pub fn current(&self) -> Option<TenantScope> {
        self.context.current()
    }

    /// Returns true if the session runs under the privileged scope.
    pub fn is_privileged(&self) -> bool {
        self.current().is_some_and(|scope| scope.is_privileged())
    }

    /// Switches the session to another scope, returning the previous one.
    ///
    /// The connection filter is switched along with the binding.
    pub fn rebind(&mut self, scope: TenantScope) -> StorageResult<Option<TenantScope>> {
        self.connection.disable_filter()?;
        self.connection.enable_filter(scope)?;
        Ok(self.context.replace(scope))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns the records matching `query` that are visible in this scope.
    pub async fn find(&mut self, mut query: RecordQuery) -> StorageResult<Vec<StoredRecord>> {
        scope_query(&self.context, &mut query, "find").map_err(|e| self.reject(e))?;
        self.connection.find(&query).await
    }

    /// Counts the records matching `query` that are visible in this scope.
    pub async fn count(&mut self, mut query: RecordQuery) -> StorageResult<u64> {
        scope_query(&self.context, &mut query, "count").map_err(|e| self.reject(e))?;
        self.connection.count(&query).await
    }

    /// Reads one record. Records of other tenants read as absent.
    pub async fn get(&mut self, collection: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
        let records = self
            .find(RecordQuery::by_id(collection, id).with_limit(1))
            .await?;
        Ok(records.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Creates a record.
    ///
    /// Without an explicit `owner` the record is stamped with the bound
    /// tenant. A missing `id` is generated.
    pub async fn insert(
        &mut self,
        collection: &str,
        id: Option<String>,
        owner: Option<TenantId>,
        data: Value,
    ) -> StorageResult<StoredRecord> {
        let scope = self.require("insert")?;
        let id = id.filter(|id| !id.is_empty()).unwrap_or_else(new_id);
        let owner = ownership::assign_on_create(scope, collection, &id, owner)
            .map_err(|e| self.reject(e))?;
        self.insert_record(StoredRecord::new(collection, id, owner, data))
            .await
    }

    /// Replaces the body of an existing record.
    ///
    /// `owner` is the owner carried by the new payload, if any; it must match
    /// the stored owner. `expected_version` enables an optimistic check.
    pub async fn replace(
        &mut self,
        collection: &str,
        id: &str,
        owner: Option<TenantId>,
        expected_version: Option<u64>,
        data: Value,
    ) -> StorageResult<StoredRecord> {
        let scope = self.require("replace")?;
        let stored = self.ownership(collection, id).await?;
        ownership::check_update(scope, collection, id, stored.owner, owner)
            .map_err(|e| self.reject(e))?;

        if let Some(expected) = expected_version
            && expected != stored.version
        {
            return Err(version_conflict(collection, id, expected, stored.version));
        }

        let current = self
            .get(collection, id)
            .await?
            .ok_or_else(|| not_found(collection, id))?;
        if current.version() != stored.version || current.tenant_id() != stored.owner {
            return Err(version_conflict(
                collection,
                id,
                stored.version,
                current.version(),
            ));
        }

        let next = current.new_version(data);
        if !self.connection.replace(&next, current.version()).await? {
            let actual = self.ownership(collection, id).await?.version;
            return Err(version_conflict(collection, id, current.version(), actual));
        }

        debug!(
            collection,
            id,
            version = next.version(),
            "Record replaced"
        );
        Ok(next)
    }

    /// Deletes a record.
    pub async fn remove(&mut self, collection: &str, id: &str) -> StorageResult<()> {
        let scope = self.require("remove")?;
        let stored = self.ownership(collection, id).await?;
        ownership::check_delete(scope, collection, id, stored.owner)
            .map_err(|e| self.reject(e))?;

        if !self.connection.remove(collection, id, stored.owner).await? {
            return Err(not_found(collection, id));
        }
        debug!(collection, id, "Record removed");
        Ok(())
    }

    /// Moves a record to another tenant.
    ///
    /// This is the only way a record's owner can change. It requires the
    /// privileged scope and is written to the audit log.
    pub async fn reassign_owner(
        &mut self,
        collection: &str,
        id: &str,
        new_owner: TenantId,
    ) -> StorageResult<StoredRecord> {
        let scope = self.require("reassign owner")?;
        ownership::check_reassignment(scope, collection, id).map_err(|e| self.reject(e))?;

        let current = self
            .get(collection, id)
            .await?
            .ok_or_else(|| not_found(collection, id))?;
        if current.tenant_id() == new_owner {
            return Ok(current);
        }

        let change = OwnerReassignment {
            collection: collection.to_string(),
            id: id.to_string(),
            from: current.tenant_id(),
            to: new_owner,
            actor: self.context.user_id().map(str::to_string),
            at: Utc::now(),
        };
        if !self.connection.reassign(&change).await? {
            let actual = self.ownership(collection, id).await?.version;
            return Err(version_conflict(collection, id, current.version(), actual));
        }
        audit::record_reassignment(&self.context, &change);

        self.get(collection, id)
            .await?
            .ok_or_else(|| not_found(collection, id))
    }

    // ------------------------------------------------------------------
    // Typed entities
    // ------------------------------------------------------------------

    /// Creates an entity, stamping its owner and id when unset.
    pub async fn create<E: Entity>(&mut self, mut entity: E) -> StorageResult<E> {
        let scope = self.require("create")?;
        if entity.id().is_empty() {
            entity.set_id(new_id());
        }
        let owner = ownership::assign_on_create(scope, E::COLLECTION, entity.id(), entity.owner())
            .map_err(|e| self.reject(e))?;
        entity.set_owner(owner);

        let record = StoredRecord::new(
            E::COLLECTION,
            entity.id().to_string(),
            owner,
            serde_json::to_value(&entity)?,
        );
        let record = self.insert_record(record).await?;
        Ok(record.to_entity()?)
    }

    /// Reads an entity by id.
    pub async fn read<E: Entity>(&mut self, id: &str) -> StorageResult<Option<E>> {
        match self.get(E::COLLECTION, id).await? {
            Some(record) => Ok(Some(record.to_entity()?)),
            None => Ok(None),
        }
    }

    /// Lists entities matching `query`, which must target `E::COLLECTION`.
    pub async fn list<E: Entity>(&mut self, query: RecordQuery) -> StorageResult<Vec<E>> {
        if query.collection() != E::COLLECTION {
            return Err(ValidationError::InvalidRecord {
                collection: E::COLLECTION.to_string(),
                message: format!("query targets collection '{}'", query.collection()),
            }
            .into());
        }
        let records = self.find(query).await?;
        records
            .iter()
            .map(|record| record.to_entity().map_err(StorageError::from))
            .collect()
    }

    /// Replaces an entity. Its owner must be unset or match the stored owner.
    pub async fn update<E: Entity>(&mut self, mut entity: E) -> StorageResult<E> {
        let supplied = entity.owner();
        if supplied.is_none()
            && let Some(current) = self.get(E::COLLECTION, entity.id()).await?
        {
            entity.set_owner(current.tenant_id());
        }

        let id = entity.id().to_string();
        let data = serde_json::to_value(&entity)?;
        let record = self
            .replace(E::COLLECTION, &id, supplied, None, data)
            .await?;
        Ok(record.to_entity()?)
    }

    /// Deletes an entity by id.
    pub async fn delete<E: Entity>(&mut self, id: &str) -> StorageResult<()> {
        self.remove(E::COLLECTION, id).await
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require(&self, operation: &str) -> StorageResult<TenantScope> {
        self.context
            .require_for_write(operation)
            .map_err(|e| self.reject(e))
    }

    fn reject(&self, err: TenantError) -> StorageError {
        audit::record_rejection(&self.context, &err);
        StorageError::Tenant(err)
    }

    async fn ownership(&mut self, collection: &str, id: &str) -> StorageResult<RecordOwnership> {
        self.connection
            .ownership(collection, id)
            .await?
            .ok_or_else(|| not_found(collection, id))
    }

    async fn insert_record(&mut self, record: StoredRecord) -> StorageResult<StoredRecord> {
        self.connection.insert(&record).await?;
        debug!(
            collection = record.collection(),
            id = record.id(),
            owner = %record.tenant_id(),
            "Record created"
        );
        Ok(record)
    }
}

impl<C: IsolationConnection> Drop for ScopedSession<C> {
    fn drop(&mut self) {
        if let Err(err) = self.connection.disable_filter() {
            error!(
                backend = self.backend_name,
                correlation_id = self.context.correlation_id(),
                error = %err,
                "Failed to clear isolation filter; connection must not be reused"
            );
        } else {
            debug!(backend = self.backend_name, "Isolation filter disabled");
        }
        self.context.release();
    }
}

impl<C: IsolationConnection> std::fmt::Debug for ScopedSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("backend", &self.backend_name)
            .field("scope", &self.context.current())
            .finish_non_exhaustive()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn not_found(collection: &str, id: &str) -> StorageError {
    RecordError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
    .into()
}

fn version_conflict(collection: &str, id: &str, expected: u64, actual: u64) -> StorageError {
    ConcurrencyError::VersionConflict {
        collection: collection.to_string(),
        id: id.to_string(),
        expected_version: expected,
        actual_version: actual,
    }
    .into()
}
