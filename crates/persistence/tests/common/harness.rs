//! A single-slot backend for observing connection reuse.
//!
//! [`SlotBackend`] wraps the in-memory backend behind a pool of exactly one
//! connection. Tests can inspect the idle connection's filter state, count
//! checkouts and make reads stall forever so a caller can cancel mid-call.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use bastion_persistence::backends::memory::{MemoryBackend, MemoryConnection};
use bastion_persistence::core::{OwnerReassignment, RecordOwnership};
use bastion_persistence::error::{BackendError, StorageResult};
use bastion_persistence::tenant::{TenantId, TenantScope};
use bastion_persistence::types::{RecordQuery, StoredRecord};
use bastion_persistence::{BackendKind, IsolationBackend, IsolationConnection};

#[derive(Debug)]
pub struct SlotBackend {
    slot: Arc<Mutex<Option<MemoryConnection>>>,
    stall_reads: Arc<AtomicBool>,
    acquisitions: AtomicUsize,
}

impl SlotBackend {
    pub async fn new() -> Self {
        let connection = MemoryBackend::new()
            .acquire()
            .await
            .expect("memory connection");
        Self {
            slot: Arc::new(Mutex::new(Some(connection))),
            stall_reads: Arc::new(AtomicBool::new(false)),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent read hang until the caller gives up.
    pub fn stall_reads(&self, stall: bool) {
        self.stall_reads.store(stall, Ordering::SeqCst);
    }

    /// Number of successful checkouts so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Filter state of the idle connection, or `None` while it is checked out.
    pub fn idle_filter(&self) -> Option<Option<TenantScope>> {
        let slot = self.slot.lock().expect("slot lock");
        slot.as_ref()
            .map(|connection| connection.active_filter().expect("filter state"))
    }
}

#[async_trait]
impl IsolationBackend for SlotBackend {
    type Connection = SlotConnection;

    fn kind(&self) -> BackendKind {
        BackendKind::Custom("slot")
    }

    fn name(&self) -> &'static str {
        "slot"
    }

    async fn acquire(&self) -> StorageResult<Self::Connection> {
        let connection = self.slot.lock().expect("slot lock").take().ok_or_else(|| {
            BackendError::PoolExhausted {
                backend_name: "slot".to_string(),
            }
        })?;
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(SlotConnection {
            inner: Some(connection),
            slot: Arc::clone(&self.slot),
            stall_reads: Arc::clone(&self.stall_reads),
        })
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// The checked-out connection. Returns itself to the slot when dropped, in
/// whatever filter state it is in.
pub struct SlotConnection {
    inner: Option<MemoryConnection>,
    slot: Arc<Mutex<Option<MemoryConnection>>>,
    stall_reads: Arc<AtomicBool>,
}

impl SlotConnection {
    fn connection(&mut self) -> &mut MemoryConnection {
        self.inner.as_mut().expect("connection present until drop")
    }

    async fn maybe_stall(&self) {
        if self.stall_reads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for SlotConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.inner.take() {
            *self.slot.lock().expect("slot lock") = Some(connection);
        }
    }
}

#[async_trait]
impl IsolationConnection for SlotConnection {
    fn enable_filter(&mut self, scope: TenantScope) -> StorageResult<()> {
        self.connection().enable_filter(scope)
    }

    fn disable_filter(&mut self) -> StorageResult<()> {
        self.connection().disable_filter()
    }

    fn active_filter(&self) -> StorageResult<Option<TenantScope>> {
        self.inner
            .as_ref()
            .expect("connection present until drop")
            .active_filter()
    }

    async fn find(&mut self, query: &RecordQuery) -> StorageResult<Vec<StoredRecord>> {
        self.maybe_stall().await;
        self.connection().find(query).await
    }

    async fn count(&mut self, query: &RecordQuery) -> StorageResult<u64> {
        self.maybe_stall().await;
        self.connection().count(query).await
    }

    async fn ownership(
        &mut self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<RecordOwnership>> {
        self.connection().ownership(collection, id).await
    }

    async fn insert(&mut self, record: &StoredRecord) -> StorageResult<()> {
        self.connection().insert(record).await
    }

    async fn replace(
        &mut self,
        record: &StoredRecord,
        expected_version: u64,
    ) -> StorageResult<bool> {
        self.connection().replace(record, expected_version).await
    }

    async fn remove(&mut self, collection: &str, id: &str, owner: TenantId) -> StorageResult<bool> {
        self.connection().remove(collection, id, owner).await
    }

    async fn reassign(&mut self, change: &OwnerReassignment) -> StorageResult<bool> {
        self.connection().reassign(change).await
    }
}
