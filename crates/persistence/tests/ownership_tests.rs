//! Ownership rule tests: stamping, cross-tenant writes and re-parenting.

#[macro_use]
mod common;

use serde_json::json;

use bastion_persistence::error::{ConcurrencyError, RecordError, StorageError, TenantError};
use bastion_persistence::isolation::IsolatedStore;
use bastion_persistence::tenant::{RequestContext, TenantScope};
use bastion_persistence::types::RecordQuery;
use bastion_persistence::{Entity, IsolationBackend};

use common::{Note, seed, tenant, tenant_id};

backend_tests!(
    test_create_stamps_bound_tenant,
    test_create_for_foreign_tenant_is_rejected,
    test_privileged_create_requires_owner,
    test_privileged_create_for_tenant_is_visible_to_it,
    test_duplicate_id_is_rejected,
    test_update_of_foreign_record_is_rejected,
    test_update_cannot_change_owner,
    test_privileged_update_preserves_owner,
    test_update_bumps_version,
    test_stale_version_is_rejected,
    test_delete_of_foreign_record_is_rejected,
    test_delete_missing_record_is_not_found,
    test_tenant_cannot_reassign,
    test_privileged_reassignment_moves_record,
);

fn ctx() -> RequestContext {
    RequestContext::new().with_user_id("tester")
}

async fn privileged_count<B: IsolationBackend>(store: &IsolatedStore<B>) -> u64 {
    store
        .with_scope(&ctx(), TenantScope::Privileged, |mut session| async move {
            session.count(RecordQuery::new(Note::COLLECTION)).await
        })
        .await
        .unwrap()
}

async fn read_as<B: IsolationBackend>(
    store: &IsolatedStore<B>,
    scope: TenantScope,
    id: &str,
) -> Option<Note> {
    let id = id.to_string();
    store
        .with_scope(&ctx(), scope, |mut session| async move {
            session.read::<Note>(&id).await
        })
        .await
        .unwrap()
}

fn tenant_error(err: &StorageError) -> &TenantError {
    err.as_tenant()
        .unwrap_or_else(|| panic!("expected a tenant error, got {err:?}"))
}

// ============================================================================
// Create
// ============================================================================

async fn test_create_stamps_bound_tenant<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = store
        .with_scope(&ctx(), tenant(4), |mut session| async move {
            session.create(Note::new("first")).await
        })
        .await
        .unwrap();

    assert_eq!(created.tenant_id, Some(tenant_id(4)));
    assert!(!created.id.is_empty());

    let stored = read_as(&store, tenant(4), &created.id).await.unwrap();
    assert_eq!(stored, created);
}

async fn test_create_for_foreign_tenant_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    let err = store
        .with_scope(&ctx(), tenant(1), |mut session| async move {
            session.create(Note::new("planted").owned_by(2)).await
        })
        .await
        .unwrap_err();

    match tenant_error(&err) {
        TenantError::CrossTenantViolation { scope, owner, .. } => {
            assert_eq!(*scope, tenant_id(1));
            assert_eq!(*owner, tenant_id(2));
        }
        other => panic!("expected CrossTenantViolation, got {other:?}"),
    }
    assert_eq!(privileged_count(&store).await, 0);
}

async fn test_privileged_create_requires_owner<B: IsolationBackend>(store: IsolatedStore<B>) {
    let err = store
        .with_scope(&ctx(), TenantScope::Privileged, |mut session| async move {
            session.create(Note::new("orphan")).await
        })
        .await
        .unwrap_err();

    assert!(matches!(
        tenant_error(&err),
        TenantError::MissingTenant { .. }
    ));
    assert_eq!(privileged_count(&store).await, 0);
}

async fn test_privileged_create_for_tenant_is_visible_to_it<B: IsolationBackend>(
    store: IsolatedStore<B>,
) {
    let created = store
        .with_scope(&ctx(), TenantScope::Privileged, |mut session| async move {
            session.create(Note::new("provisioned").owned_by(9)).await
        })
        .await
        .unwrap();

    assert_eq!(created.tenant_id, Some(tenant_id(9)));
    assert!(read_as(&store, tenant(9), &created.id).await.is_some());
    assert!(read_as(&store, tenant(8), &created.id).await.is_none());
}

async fn test_duplicate_id_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    seed_with_id(&store, tenant(1), "fixed").await;

    let err = store
        .with_scope(&ctx(), tenant(2), |mut session| async move {
            session.create(Note::new("again").with_id("fixed")).await
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::Record(RecordError::AlreadyExists { .. })
    ));
    let original = read_as(&store, tenant(1), "fixed").await.unwrap();
    assert_eq!(original.title, "original");
}

async fn seed_with_id<B: IsolationBackend>(store: &IsolatedStore<B>, scope: TenantScope, id: &str) {
    let note = Note::new("original").with_id(id);
    store
        .with_scope(&ctx(), scope, |mut session| async move {
            session.create(note).await
        })
        .await
        .unwrap();
}

// ============================================================================
// Update
// ============================================================================

async fn test_update_of_foreign_record_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["mine"]).await.remove(0);

    let mut hijacked = created.clone();
    hijacked.title = "hijacked".to_string();
    hijacked.tenant_id = None;

    let err = store
        .with_scope(&ctx(), tenant(2), |mut session| async move {
            session.update(hijacked).await
        })
        .await
        .unwrap_err();

    assert!(matches!(
        tenant_error(&err),
        TenantError::TenantMismatch { .. }
    ));
    let stored = read_as(&store, tenant(1), &created.id).await.unwrap();
    assert_eq!(stored.title, "mine");
}

async fn test_update_cannot_change_owner<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["mine"]).await.remove(0);

    for scope in [tenant(1), TenantScope::Privileged] {
        let moved = created.clone().owned_by(2);
        let err = store
            .with_scope(&ctx(), scope, |mut session| async move {
                session.update(moved).await
            })
            .await
            .unwrap_err();

        match tenant_error(&err) {
            TenantError::TenantMismatch {
                expected, actual, ..
            } => {
                assert_eq!(*expected, tenant_id(1));
                assert_eq!(*actual, tenant_id(2));
            }
            other => panic!("expected TenantMismatch under {scope}, got {other:?}"),
        }
    }

    assert!(read_as(&store, tenant(1), &created.id).await.is_some());
    assert!(read_as(&store, tenant(2), &created.id).await.is_none());
}

async fn test_privileged_update_preserves_owner<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(3), &["draft"]).await.remove(0);

    let mut edited = created.clone();
    edited.title = "reviewed".to_string();
    edited.tenant_id = None;

    let updated = store
        .with_scope(&ctx(), TenantScope::Privileged, |mut session| async move {
            session.update(edited).await
        })
        .await
        .unwrap();

    assert_eq!(updated.tenant_id, Some(tenant_id(3)));
    assert_eq!(
        read_as(&store, tenant(3), &created.id).await.unwrap().title,
        "reviewed"
    );
}

async fn test_update_bumps_version<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["v1"]).await.remove(0);
    let id = created.id.clone();

    let record = store
        .with_scope(&ctx(), tenant(1), |mut session| async move {
            session
                .replace(Note::COLLECTION, &id, None, Some(1), json!({"title": "v2"}))
                .await
        })
        .await
        .unwrap();

    assert_eq!(record.version(), 2);
    assert_eq!(record.tenant_id(), tenant_id(1));
    assert!(record.updated_at() >= record.created_at());
}

async fn test_stale_version_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["v1"]).await.remove(0);
    let id = created.id.clone();

    let err = store
        .with_scope(&ctx(), tenant(1), |mut session| async move {
            session
                .replace(Note::COLLECTION, &id, None, Some(1), json!({"title": "v2"}))
                .await?;
            session
                .replace(Note::COLLECTION, &id, None, Some(1), json!({"title": "lost"}))
                .await
        })
        .await
        .unwrap_err();

    match err {
        StorageError::Concurrency(ConcurrencyError::VersionConflict {
            expected_version,
            actual_version,
            ..
        }) => {
            assert_eq!(expected_version, 1);
            assert_eq!(actual_version, 2);
        }
        other => panic!("expected VersionConflict, got {other:?}"),
    }
}

// ============================================================================
// Delete
// ============================================================================

async fn test_delete_of_foreign_record_is_rejected<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["keep"]).await.remove(0);
    let id = created.id.clone();

    let err = store
        .with_scope(&ctx(), tenant(2), |mut session| async move {
            session.delete::<Note>(&id).await
        })
        .await
        .unwrap_err();

    assert!(matches!(
        tenant_error(&err),
        TenantError::CrossTenantViolation { .. }
    ));
    assert!(read_as(&store, tenant(1), &created.id).await.is_some());

    let id = created.id.clone();
    store
        .with_scope(&ctx(), tenant(1), |mut session| async move {
            session.delete::<Note>(&id).await
        })
        .await
        .unwrap();
    assert_eq!(privileged_count(&store).await, 0);
}

async fn test_delete_missing_record_is_not_found<B: IsolationBackend>(store: IsolatedStore<B>) {
    let err = store
        .with_scope(&ctx(), tenant(1), |mut session| async move {
            session.delete::<Note>("nope").await
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::Record(RecordError::NotFound { .. })
    ));
}

// ============================================================================
// Reassignment
// ============================================================================

async fn test_tenant_cannot_reassign<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["mine"]).await.remove(0);
    let id = created.id.clone();

    let err = store
        .with_scope(&ctx(), tenant(1), |mut session| async move {
            session
                .reassign_owner(Note::COLLECTION, &id, tenant_id(2))
                .await
        })
        .await
        .unwrap_err();

    assert!(matches!(
        tenant_error(&err),
        TenantError::ReassignmentNotPermitted { .. }
    ));
    assert!(read_as(&store, tenant(1), &created.id).await.is_some());
}

async fn test_privileged_reassignment_moves_record<B: IsolationBackend>(store: IsolatedStore<B>) {
    let created = seed(&store, tenant(1), &["moving"]).await.remove(0);
    let id = created.id.clone();

    let moved = store
        .with_scope(&ctx(), TenantScope::Privileged, |mut session| async move {
            session
                .reassign_owner(Note::COLLECTION, &id, tenant_id(2))
                .await
        })
        .await
        .unwrap();

    assert_eq!(moved.tenant_id(), tenant_id(2));
    assert!(moved.version() > 1);
    assert!(read_as(&store, tenant(1), &created.id).await.is_none());

    let now_owned = read_as(&store, tenant(2), &created.id).await.unwrap();
    assert_eq!(now_owned.tenant_id, Some(tenant_id(2)));
    assert_eq!(now_owned.title, "moving");
}

// ============================================================================
// Backend-specific
// ============================================================================

#[tokio::test]
async fn test_memory_reassignment_is_logged() {
    let store = common::memory_store();
    let created = seed(&store, tenant(1), &["audited"]).await.remove(0);
    let id = created.id.clone();

    store
        .with_scope(
            &RequestContext::new().with_user_id("operator-7"),
            TenantScope::Privileged,
            |mut session| async move {
                session
                    .reassign_owner(Note::COLLECTION, &id, tenant_id(5))
                    .await
            },
        )
        .await
        .unwrap();

    let log = store.backend().reassignment_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, created.id);
    assert_eq!(log[0].from, tenant_id(1));
    assert_eq!(log[0].to, tenant_id(5));
    assert_eq!(log[0].actor.as_deref(), Some("operator-7"));
}
