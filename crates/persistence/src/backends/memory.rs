//! In-memory backend.
//!
//! Keeps every record in a shared map behind an async read-write lock. It is
//! meant for tests and local development; each connection carries its own
//! filter state exactly like a pooled database connection would.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{
    BackendKind, IsolationBackend, IsolationConnection, OwnerReassignment, RecordOwnership,
};
use crate::error::{BackendError, RecordError, StorageError, StorageResult};
use crate::tenant::{TenantId, TenantScope};
use crate::types::{RecordQuery, StoredRecord};

const BACKEND_NAME: &str = "memory";

type RecordKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<RecordKey, StoredRecord>,
    reassignments: Vec<OwnerReassignment>,
}

/// Process-local backend holding records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every owner change recorded so far.
    pub async fn reassignment_log(&self) -> Vec<OwnerReassignment> {
        self.state.read().await.reassignments.clone()
    }
}

#[async_trait]
impl IsolationBackend for MemoryBackend {
    type Connection = MemoryConnection;

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn acquire(&self) -> StorageResult<Self::Connection> {
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            filter: None,
        })
    }

    async fn health_check(&self) -> StorageResult<()> {
        let _ = self.state.read().await;
        Ok(())
    }
}

/// A handle onto the shared in-memory state with its own filter.
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<RwLock<MemoryState>>,
    filter: Option<TenantScope>,
}

impl MemoryConnection {
    fn visible(&self, owner: TenantId) -> bool {
        self.filter.is_some_and(|scope| scope.permits(owner))
    }

    fn guard_write(&self, owner: TenantId, operation: &str) -> StorageResult<()> {
        if self.visible(owner) {
            Ok(())
        } else {
            Err(filter_rejected(operation))
        }
    }
}

#[async_trait]
impl IsolationConnection for MemoryConnection {
    fn enable_filter(&mut self, scope: TenantScope) -> StorageResult<()> {
        if let Some(active) = self.filter {
            return Err(BackendError::StaleSession {
                backend_name: BACKEND_NAME.to_string(),
                active,
            }
            .into());
        }
        self.filter = Some(scope);
        Ok(())
    }

    fn disable_filter(&mut self) -> StorageResult<()> {
        self.filter = None;
        Ok(())
    }

    fn active_filter(&self) -> StorageResult<Option<TenantScope>> {
        Ok(self.filter)
    }

    async fn find(&mut self, query: &RecordQuery) -> StorageResult<Vec<StoredRecord>> {
        let state = self.state.read().await;
        let limit = query.limit().map_or(usize::MAX, |l| l as usize);
        Ok(state
            .records
            .values()
            .filter(|record| self.visible(record.tenant_id()) && query.matches(record))
            .skip(query.offset() as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&mut self, query: &RecordQuery) -> StorageResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .filter(|record| self.visible(record.tenant_id()) && query.matches(record))
            .count() as u64)
    }

    async fn ownership(
        &mut self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<RecordOwnership>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .get(&key(collection, id))
            .map(|record| RecordOwnership {
                owner: record.tenant_id(),
                version: record.version(),
            }))
    }

    async fn insert(&mut self, record: &StoredRecord) -> StorageResult<()> {
        self.guard_write(record.tenant_id(), "insert")?;
        let mut state = self.state.write().await;
        let key = key(record.collection(), record.id());
        if state.records.contains_key(&key) {
            return Err(RecordError::AlreadyExists {
                collection: record.collection().to_string(),
                id: record.id().to_string(),
            }
            .into());
        }
        state.records.insert(key, record.clone());
        Ok(())
    }

    async fn replace(
        &mut self,
        record: &StoredRecord,
        expected_version: u64,
    ) -> StorageResult<bool> {
        self.guard_write(record.tenant_id(), "replace")?;
        let mut state = self.state.write().await;
        match state.records.get_mut(&key(record.collection(), record.id())) {
            Some(stored)
                if stored.tenant_id() == record.tenant_id()
                    && stored.version() == expected_version =>
            {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&mut self, collection: &str, id: &str, owner: TenantId) -> StorageResult<bool> {
        self.guard_write(owner, "remove")?;
        let mut state = self.state.write().await;
        let key = key(collection, id);
        match state.records.get(&key) {
            Some(stored) if stored.tenant_id() == owner => {
                state.records.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reassign(&mut self, change: &OwnerReassignment) -> StorageResult<bool> {
        if self.filter != Some(TenantScope::Privileged) {
            return Err(filter_rejected("reassign"));
        }
        let mut state = self.state.write().await;
        let key = key(&change.collection, &change.id);
        let moved = match state.records.get(&key) {
            Some(stored) if stored.tenant_id() == change.from => stored.reowned(change.to),
            _ => return Ok(false),
        };
        state.records.insert(key, moved);
        state.reassignments.push(change.clone());
        Ok(true)
    }
}

fn key(collection: &str, id: &str) -> RecordKey {
    (collection.to_string(), id.to_string())
}

fn filter_rejected(operation: &str) -> StorageError {
    BackendError::FilterRejected {
        backend_name: BACKEND_NAME.to_string(),
        operation: operation.to_string(),
    }
    .into()
}
