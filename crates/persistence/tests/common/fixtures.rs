//! Test entities and store constructors.

use serde::{Deserialize, Serialize};

use bastion_persistence::backends::memory::MemoryBackend;
#[cfg(feature = "sqlite")]
use bastion_persistence::backends::sqlite::SqliteBackend;
use bastion_persistence::error::StorageError;
use bastion_persistence::isolation::IsolatedStore;
use bastion_persistence::tenant::{Owned, RequestContext, TenantId, TenantScope};
use bastion_persistence::types::Entity;
use bastion_persistence::IsolationBackend;

/// A minimal tenant-owned entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub title: String,
    #[serde(default)]
    pub pinned: bool,
}

impl Note {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            tenant_id: None,
            title: title.into(),
            pinned: false,
        }
    }

    pub fn owned_by(mut self, tenant: i64) -> Self {
        self.tenant_id = Some(tenant_id(tenant));
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl Owned for Note {
    fn owner(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn set_owner(&mut self, owner: TenantId) {
        self.tenant_id = Some(owner);
    }
}

impl Entity for Note {
    const COLLECTION: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

pub fn tenant_id(id: i64) -> TenantId {
    TenantId::new(id).expect("valid tenant id")
}

pub fn tenant(id: i64) -> TenantScope {
    TenantScope::Tenant(tenant_id(id))
}

pub fn memory_store() -> IsolatedStore<MemoryBackend> {
    IsolatedStore::new(MemoryBackend::new())
}

#[cfg(feature = "sqlite")]
pub fn create_sqlite_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

#[cfg(feature = "sqlite")]
pub fn sqlite_store() -> IsolatedStore<SqliteBackend> {
    IsolatedStore::new(create_sqlite_backend())
}

/// Creates one note per title under `scope` and returns them as stored.
pub async fn seed<B: IsolationBackend>(
    store: &IsolatedStore<B>,
    scope: TenantScope,
    titles: &[&str],
) -> Vec<Note> {
    let notes: Vec<Note> = titles.iter().map(|title| Note::new(*title)).collect();
    store
        .with_scope(&RequestContext::new(), scope, |mut session| async move {
            let mut created = Vec::with_capacity(notes.len());
            for note in notes {
                created.push(session.create(note).await?);
            }
            Ok::<_, StorageError>(created)
        })
        .await
        .expect("seeding notes")
}
