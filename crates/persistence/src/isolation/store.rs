//! Entry point for tenant-scoped store access.

use std::future::Future;
use std::sync::Arc;

use super::audit;
use super::session::ScopedSession;
use crate::core::IsolationBackend;
use crate::error::{StorageError, StorageResult, TenantError};
use crate::tenant::{RequestContext, TenantScope};

/// A backend wrapped so that every access runs inside a scoped session.
///
/// # Examples
///
/// ```
/// use bastion_persistence::backends::memory::MemoryBackend;
/// use bastion_persistence::error::StorageError;
/// use bastion_persistence::isolation::IsolatedStore;
/// use bastion_persistence::tenant::{RequestContext, TenantScope};
/// use bastion_persistence::types::RecordQuery;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = IsolatedStore::new(MemoryBackend::new());
/// let ctx = RequestContext::new();
///
/// store
///     .with_scope(&ctx, TenantScope::tenant(1).unwrap(), |mut session| async move {
///         session.insert("notes", None, None, json!({"title": "a"})).await
///     })
///     .await
///     .unwrap();
///
/// let seen = store
///     .with_scope(&ctx, TenantScope::tenant(2).unwrap(), |mut session| async move {
///         session.find(RecordQuery::new("notes")).await
///     })
///     .await
///     .unwrap();
/// assert!(seen.is_empty());
/// # Ok::<(), StorageError>(())
/// # }).unwrap();
/// ```
#[derive(Debug)]
pub struct IsolatedStore<B> {
    backend: Arc<B>,
}

impl<B> Clone for IsolatedStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: IsolationBackend> IsolatedStore<B> {
    /// Wraps a backend.
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Wraps a shared backend.
    pub fn from_arc(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Returns the wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs `op` with `scope` bound on a fresh connection.
    ///
    /// The sequence is: bind the scope on a child of `ctx`, check out a
    /// connection, enable the connection filter, run `op`. When the session handed
    /// to `op` is dropped the filter is disabled, the scope released and the
    /// connection checked back in, whether `op` succeeded, failed or was
    /// cancelled.
    ///
    /// Fails with [`TenantError::AlreadyBound`] if `ctx` already has a scope
    /// bound; scopes do not nest.
    pub async fn with_scope<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        scope: TenantScope,
        op: F,
    ) -> Result<T, E>
    where
        F: FnOnce(ScopedSession<B::Connection>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        let bound = ctx.enter(scope).map_err(|err| rejected(ctx, err))?;
        let session = self.open(bound).await?;
        op(session).await
    }

    /// Runs `op` under the scope already bound on `ctx`.
    ///
    /// Fails with [`TenantError::UnscopedAccess`] before any connection is
    /// checked out when `ctx` is unbound.
    pub async fn in_current_scope<T, E, F, Fut>(&self, ctx: &RequestContext, op: F) -> Result<T, E>
    where
        F: FnOnce(ScopedSession<B::Connection>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        let scope = ctx.current().ok_or_else(|| {
            rejected(
                ctx,
                TenantError::UnscopedAccess {
                    operation: "store access".to_string(),
                },
            )
        })?;
        let bound = ctx.fork().enter(scope).map_err(|err| rejected(ctx, err))?;
        let session = self.open(bound).await?;
        op(session).await
    }

    async fn open(&self, bound: RequestContext) -> StorageResult<ScopedSession<B::Connection>> {
        let connection = self.backend.acquire().await?;
        ScopedSession::open(bound, connection, self.backend.name())
    }
}

fn rejected(ctx: &RequestContext, err: TenantError) -> StorageError {
    audit::record_rejection(ctx, &err);
    StorageError::Tenant(err)
}
