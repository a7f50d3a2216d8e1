//! Tenant isolation tests.
//!
//! Every test here runs against both the in-memory and the SQLite backend.

#[macro_use]
mod common;

use serde_json::json;

use bastion_persistence::error::{StorageError, TenantError};
use bastion_persistence::isolation::IsolatedStore;
use bastion_persistence::tenant::{RequestContext, TenantScope};
use bastion_persistence::types::{Predicate, RecordQuery};
use bastion_persistence::{Entity, IsolationBackend};

use common::{Note, seed, tenant, tenant_id};

backend_tests!(
    test_tenant_reads_only_own_records,
    test_privileged_scope_sees_all_tenants,
    test_foreign_record_reads_as_absent,
    test_caller_predicate_cannot_widen_scope,
    test_count_is_scoped,
    test_field_filter_stays_within_tenant,
    test_unbound_context_is_rejected,
    test_nested_scope_is_rejected,
    test_in_current_scope_uses_bound_scope,
    test_failed_operation_leaves_store_usable,
    test_rebind_switches_visible_records,
);

async fn list_notes<B: IsolationBackend>(store: &IsolatedStore<B>, scope: TenantScope) -> Vec<Note> {
    store
        .with_scope(&RequestContext::new(), scope, |mut session| async move {
            session.list::<Note>(RecordQuery::new(Note::COLLECTION)).await
        })
        .await
        .expect("listing notes")
}

// ============================================================================
// Read isolation
// ============================================================================

async fn test_tenant_reads_only_own_records<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1", "a2"]).await;
    seed(&store, tenant(2), &["b1"]).await;

    let first = list_notes(&store, tenant(1)).await;
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|note| note.tenant_id == Some(tenant_id(1))));

    let second = list_notes(&store, tenant(2)).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].title, "b1");
    assert_eq!(second[0].tenant_id, Some(tenant_id(2)));

    assert!(list_notes(&store, tenant(3)).await.is_empty());
}

async fn test_privileged_scope_sees_all_tenants<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1"]).await;
    seed(&store, tenant(2), &["b1", "b2"]).await;

    let all = list_notes(&store, TenantScope::Privileged).await;
    assert_eq!(all.len(), 3);

    let mut owners: Vec<_> = all.iter().filter_map(|note| note.tenant_id).collect();
    owners.sort();
    owners.dedup();
    assert_eq!(owners, vec![tenant_id(1), tenant_id(2)]);
}

async fn test_foreign_record_reads_as_absent<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["secret"]).await;
    let id = created[0].id.clone();

    let foreign = store
        .with_scope(&RequestContext::new(), tenant(2), |mut session| {
            let id = id.clone();
            async move { session.read::<Note>(&id).await }
        })
        .await
        .unwrap();
    assert!(foreign.is_none());

    let own = store
        .with_scope(&RequestContext::new(), tenant(1), |mut session| async move {
            session.read::<Note>(&id).await
        })
        .await
        .unwrap();
    assert_eq!(own.map(|note| note.title), Some("secret".to_string()));
}

async fn test_caller_predicate_cannot_widen_scope<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1"]).await;
    seed(&store, tenant(2), &["b1"]).await;

    let seen = store
        .with_scope(&RequestContext::new(), tenant(2), |mut session| async move {
            session
                .find(
                    RecordQuery::new(Note::COLLECTION)
                        .with_predicate(Predicate::Owner(tenant_id(1))),
                )
                .await
        })
        .await
        .unwrap();
    assert!(seen.is_empty());
}

async fn test_count_is_scoped<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1", "a2", "a3"]).await;
    seed(&store, tenant(2), &["b1"]).await;

    let count_in = |scope: TenantScope| {
        let store = store.clone();
        async move {
            store
                .with_scope(&RequestContext::new(), scope, |mut session| async move {
                    session.count(RecordQuery::new(Note::COLLECTION)).await
                })
                .await
                .unwrap()
        }
    };

    assert_eq!(count_in(tenant(1)).await, 3);
    assert_eq!(count_in(tenant(2)).await, 1);
    assert_eq!(count_in(TenantScope::Privileged).await, 4);
}

async fn test_field_filter_stays_within_tenant<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["shared-title"]).await;
    seed(&store, tenant(2), &["shared-title"]).await;

    let matches = store
        .with_scope(&RequestContext::new(), tenant(2), |mut session| async move {
            session
                .list::<Note>(
                    RecordQuery::new(Note::COLLECTION).where_field("title", json!("shared-title")),
                )
                .await
        })
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].tenant_id, Some(tenant_id(2)));
}

// ============================================================================
// Scope lifecycle
// ============================================================================

async fn test_unbound_context_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    let err = store
        .in_current_scope(&RequestContext::new(), |mut session| async move {
            session.find(RecordQuery::new(Note::COLLECTION)).await
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Tenant(TenantError::UnscopedAccess { .. })
    ));
}

async fn test_nested_scope_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    let inner = store.clone();
    let outcome = store
        .with_scope(&RequestContext::new(), tenant(1), |session| async move {
            let nested = inner
                .with_scope(session.context(), tenant(2), |mut other| async move {
                    other.count(RecordQuery::new(Note::COLLECTION)).await
                })
                .await;
            assert_eq!(session.current(), Some(tenant(1)));
            Ok::<_, StorageError>(nested)
        })
        .await
        .unwrap();

    match outcome {
        Err(StorageError::Tenant(TenantError::AlreadyBound { current })) => {
            assert_eq!(current, tenant(1));
        }
        other => panic!("expected AlreadyBound, got {other:?}"),
    }
}

async fn test_in_current_scope_uses_bound_scope<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1"]).await;
    seed(&store, tenant(2), &["b1", "b2"]).await;

    let mut ctx = RequestContext::new().with_correlation_id("req-7");
    {
        let guard = ctx.bind(tenant(2)).unwrap();
        let seen = store
            .in_current_scope(guard.context(), |mut session| async move {
                assert_eq!(session.context().correlation_id(), Some("req-7"));
                session.count(RecordQuery::new(Note::COLLECTION)).await
            })
            .await
            .unwrap();
        assert_eq!(seen, 2);
        assert_eq!(guard.current(), Some(tenant(2)));
    }
    assert!(!ctx.is_bound());
}

async fn test_failed_operation_leaves_store_usable<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1"]).await;

    let err = store
        .with_scope(&RequestContext::new(), tenant(1), |mut session| async move {
            session.create(Note::new("x").owned_by(2)).await
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Tenant(TenantError::CrossTenantViolation { .. })
    ));

    // The next session starts from a clean connection.
    assert_eq!(list_notes(&store, tenant(2)).await.len(), 0);
    assert_eq!(list_notes(&store, TenantScope::Privileged).await.len(), 1);
}

async fn test_rebind_switches_visible_records<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed(&store, tenant(1), &["a1"]).await;
    seed(&store, tenant(2), &["b1", "b2"]).await;

    let (before, after) = store
        .with_scope(&RequestContext::new(), tenant(1), |mut session| async move {
            let before = session.count(RecordQuery::new(Note::COLLECTION)).await?;
            let previous = session.rebind(tenant(2))?;
            assert_eq!(previous, Some(tenant(1)));
            let after = session.count(RecordQuery::new(Note::COLLECTION)).await?;
            Ok::<_, StorageError>((before, after))
        })
        .await
        .unwrap();

    assert_eq!(before, 1);
    assert_eq!(after, 2);
}
