//! Core types for the persistence layer.
//!
//! - [`StoredRecord`] - A tenant-owned record with persistence metadata
//! - [`Entity`] - Typed entities mapped onto stored records
//! - [`RecordQuery`], [`Predicate`] - Conjunctive record queries
//! - [`OwnerFilter`] - The owner-predicate injection capability

mod query;
mod stored_record;

pub use query::{OwnerFilter, Predicate, RecordQuery};
pub use stored_record::{Entity, StoredRecord};
