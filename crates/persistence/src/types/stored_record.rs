//! Stored record types.
//!
//! This module defines [`StoredRecord`], the persisted shape of every
//! tenant-owned entity, and the [`Entity`] trait that maps typed entities
//! onto it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tenant::{Owned, TenantId};

/// A tenant-owned record with persistence metadata.
///
/// The `tenant_id` column is authoritative: typed entities are rehydrated
/// with this owner regardless of what their JSON body says.
///
/// # Examples
///
/// ```
/// use bastion_persistence::tenant::TenantId;
/// use bastion_persistence::types::StoredRecord;
/// use serde_json::json;
///
/// let record = StoredRecord::new(
///     "notes",
///     "n-1",
///     TenantId::new(3).unwrap(),
///     json!({"title": "hello"}),
/// );
///
/// assert_eq!(record.collection(), "notes");
/// assert_eq!(record.version(), 1);
/// assert_eq!(record.tenant_id().get(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The collection the record belongs to.
    collection: String,

    /// The record's id, unique within its collection.
    id: String,

    /// The tenant that owns this record.
    tenant_id: TenantId,

    /// Version counter, starting at 1.
    version: u64,

    /// The record body.
    data: Value,

    /// When the record was first created.
    created_at: DateTime<Utc>,

    /// When the record was last modified.
    updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Creates a version 1 record stamped with the current time.
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        tenant_id: TenantId,
        data: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            id: id.into(),
            tenant_id,
            version: 1,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a record from stored columns.
    pub fn from_storage(
        collection: impl Into<String>,
        id: impl Into<String>,
        tenant_id: TenantId,
        version: u64,
        data: Value,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            tenant_id,
            version,
            data,
            created_at,
            updated_at,
        }
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the record id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the owning tenant.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the version counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the record body.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the record, returning its body.
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Returns when the record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the record was last modified.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Builds the next version of this record with a new body.
    ///
    /// The owner is carried over unchanged.
    pub fn new_version(&self, data: Value) -> Self {
        Self {
            collection: self.collection.clone(),
            id: self.id.clone(),
            tenant_id: self.tenant_id,
            version: self.version + 1,
            data,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }

    /// Builds the next version of this record under a different owner.
    pub(crate) fn reowned(&self, owner: TenantId) -> Self {
        let mut next = self.new_version(self.data.clone());
        next.tenant_id = owner;
        next
    }

    /// Deserializes the body into a typed entity, applying the stored owner.
    pub fn to_entity<E: Entity>(&self) -> serde_json::Result<E> {
        let mut entity: E = serde_json::from_value(self.data.clone())?;
        entity.set_owner(self.tenant_id);
        entity.set_id(self.id.clone());
        Ok(entity)
    }
}

/// A typed, tenant-owned entity stored in one collection.
///
/// Entities compose ownership through [`Owned`] instead of inheriting a
/// tenant field from a base type.
pub trait Entity: Owned + Serialize + DeserializeOwned + Send + Sync {
    /// The collection the entity is stored in.
    const COLLECTION: &'static str;

    /// Returns the entity id; empty when not yet assigned.
    fn id(&self) -> &str;

    /// Sets the entity id.
    fn set_id(&mut self, id: String);
}
