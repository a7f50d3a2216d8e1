//! Record queries and predicate injection.
//!
//! A [`RecordQuery`] is a conjunction of [`Predicate`]s over one collection.
//! The isolation layer never trusts the caller to add the owner predicate;
//! it injects one through [`OwnerFilter`] before the query reaches a backend.

use serde_json::Value;

use super::stored_record::StoredRecord;
use crate::tenant::TenantId;

/// A single condition on a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches the record with this id.
    Id(String),
    /// Matches records owned by this tenant.
    Owner(TenantId),
    /// Matches records whose top-level body field equals `value`.
    FieldEquals { field: String, value: Value },
}

impl Predicate {
    /// Evaluates the predicate against a record.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        match self {
            Predicate::Id(id) => record.id() == id,
            Predicate::Owner(owner) => record.tenant_id() == *owner,
            Predicate::FieldEquals { field, value } => {
                record.data().get(field).unwrap_or(&Value::Null) == value
            }
        }
    }
}

/// The capability of restricting a query to one owner.
///
/// Anything the isolation filter can scope implements this, so the filter is
/// written once and applied to every query shape.
pub trait OwnerFilter {
    /// ANDs an owner restriction into the query.
    fn restrict_to_owner(&mut self, owner: TenantId);

    /// Returns the owners the query is restricted to.
    fn owner_restrictions(&self) -> Vec<TenantId>;
}

/// A conjunctive query over one collection.
///
/// # Examples
///
/// ```
/// use bastion_persistence::types::{OwnerFilter, Predicate, RecordQuery};
/// use bastion_persistence::tenant::TenantId;
/// use serde_json::json;
///
/// let mut query = RecordQuery::new("notes")
///     .where_field("status", json!("open"))
///     .with_limit(10);
/// query.restrict_to_owner(TenantId::new(4).unwrap());
///
/// assert_eq!(query.predicates().len(), 2);
/// assert_eq!(query.owner_restrictions(), vec![TenantId::new(4).unwrap()]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    collection: String,
    predicates: Vec<Predicate>,
    limit: Option<u32>,
    offset: u32,
}

impl RecordQuery {
    /// Creates a query matching every record of a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            predicates: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Creates a query for a single record by id.
    pub fn by_id(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(collection).with_predicate(Predicate::Id(id.into()))
    }

    /// Adds a predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds a top-level field equality predicate.
    pub fn where_field(self, field: impl Into<String>, value: Value) -> Self {
        self.with_predicate(Predicate::FieldEquals {
            field: field.into(),
            value,
        })
    }

    /// Limits the number of returned records.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matching records.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the predicates.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the limit, if any.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Returns the offset.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns true if the record satisfies the collection and every predicate.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        record.collection() == self.collection && self.predicates.iter().all(|p| p.matches(record))
    }
}

impl OwnerFilter for RecordQuery {
    fn restrict_to_owner(&mut self, owner: TenantId) {
        self.predicates.push(Predicate::Owner(owner));
    }

    fn owner_restrictions(&self) -> Vec<TenantId> {
        self.predicates
            .iter()
            .filter_map(|p| match p {
                Predicate::Owner(owner) => Some(*owner),
                _ => None,
            })
            .collect()
    }
}
