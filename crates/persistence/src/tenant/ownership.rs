//! Record ownership rules.
//!
//! Every tenant-owned entity implements [`Owned`]. The functions in this
//! module decide, for a given scope, which owner a new record receives and
//! whether an update, delete or re-parenting of an existing record is
//! allowed. They are pure; the isolation session applies them before any
//! write reaches the store.
//!
//! | Operation | Scope | Outcome |
//! |-----------|-------|---------|
//! | create, owner unset | `Tenant(T)` | owner stamped to `T` |
//! | create, owner unset | `Privileged` | `MissingTenant` |
//! | create, owner `U != T` | `Tenant(T)` | `CrossTenantViolation` |
//! | create, owner set | `Privileged` | accepted |
//! | update, stored owner `E != T` | `Tenant(T)` | `TenantMismatch` |
//! | update, payload owner `P != E` | any | `TenantMismatch` |
//! | delete, stored owner `E != T` | `Tenant(T)` | `CrossTenantViolation` |
//! | reassign | `Tenant(_)` | `ReassignmentNotPermitted` |

use super::id::TenantId;
use super::scope::TenantScope;
use crate::error::{TenantError, TenantResult};

/// An entity owned by exactly one tenant.
///
/// The owner is `None` only on a freshly built value that has not been
/// stored yet; the create path fills it in.
pub trait Owned {
    /// Returns the owning tenant, if assigned.
    fn owner(&self) -> Option<TenantId>;

    /// Sets the owning tenant.
    fn set_owner(&mut self, owner: TenantId);
}

/// Decides the owner of a record being created.
///
/// # Examples
///
/// ```
/// use bastion_persistence::tenant::{ownership, TenantId, TenantScope};
///
/// let t = TenantId::new(7).unwrap();
/// let owner = ownership::assign_on_create(TenantScope::Tenant(t), "notes", "n-1", None).unwrap();
/// assert_eq!(owner, t);
///
/// assert!(ownership::assign_on_create(TenantScope::Privileged, "notes", "n-1", None).is_err());
/// ```
pub fn assign_on_create(
    scope: TenantScope,
    collection: &str,
    id: &str,
    supplied: Option<TenantId>,
) -> TenantResult<TenantId> {
    match (scope, supplied) {
        (TenantScope::Tenant(tenant), None) => Ok(tenant),
        (TenantScope::Tenant(tenant), Some(owner)) if owner == tenant => Ok(tenant),
        (TenantScope::Tenant(tenant), Some(owner)) => Err(TenantError::CrossTenantViolation {
            scope: tenant,
            owner,
            collection: collection.to_string(),
            id: id.to_string(),
        }),
        (TenantScope::Privileged, Some(owner)) => Ok(owner),
        (TenantScope::Privileged, None) => Err(TenantError::MissingTenant {
            collection: collection.to_string(),
        }),
    }
}

/// Checks an update of a record currently owned by `stored`.
///
/// `supplied` is the owner carried by the new payload, if any. The owner of
/// an existing record is read-only on this path for every scope; moving a
/// record is done through [`check_reassignment`].
pub fn check_update(
    scope: TenantScope,
    collection: &str,
    id: &str,
    stored: TenantId,
    supplied: Option<TenantId>,
) -> TenantResult<()> {
    if let TenantScope::Tenant(tenant) = scope
        && tenant != stored
    {
        return Err(TenantError::TenantMismatch {
            collection: collection.to_string(),
            id: id.to_string(),
            expected: stored,
            actual: tenant,
        });
    }

    match supplied {
        Some(owner) if owner != stored => Err(TenantError::TenantMismatch {
            collection: collection.to_string(),
            id: id.to_string(),
            expected: stored,
            actual: owner,
        }),
        _ => Ok(()),
    }
}

/// Checks a delete of a record currently owned by `stored`.
pub fn check_delete(
    scope: TenantScope,
    collection: &str,
    id: &str,
    stored: TenantId,
) -> TenantResult<()> {
    match scope {
        TenantScope::Tenant(tenant) if tenant != stored => {
            Err(TenantError::CrossTenantViolation {
                scope: tenant,
                owner: stored,
                collection: collection.to_string(),
                id: id.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Checks that the scope may move a record to another tenant.
pub fn check_reassignment(scope: TenantScope, collection: &str, id: &str) -> TenantResult<()> {
    if scope.is_privileged() {
        Ok(())
    } else {
        Err(TenantError::ReassignmentNotPermitted {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: i64) -> TenantId {
        TenantId::new(value).unwrap()
    }

    #[test]
    fn test_create_stamps_scope_tenant() {
        let owner = assign_on_create(TenantScope::Tenant(id(1)), "notes", "n1", None).unwrap();
        assert_eq!(owner, id(1));
    }

    #[test]
    fn test_create_accepts_matching_owner() {
        let owner = assign_on_create(TenantScope::Tenant(id(1)), "notes", "n1", Some(id(1))).unwrap();
        assert_eq!(owner, id(1));
    }

    #[test]
    fn test_create_rejects_foreign_owner() {
        let err = assign_on_create(TenantScope::Tenant(id(1)), "notes", "n1", Some(id(2))).unwrap_err();
        assert!(matches!(
            err,
            TenantError::CrossTenantViolation { scope, owner, .. } if scope == id(1) && owner == id(2)
        ));
    }

    #[test]
    fn test_privileged_create_requires_owner() {
        assert!(matches!(
            assign_on_create(TenantScope::Privileged, "notes", "n1", None),
            Err(TenantError::MissingTenant { .. })
        ));
        assert_eq!(
            assign_on_create(TenantScope::Privileged, "notes", "n1", Some(id(9))).unwrap(),
            id(9)
        );
    }

    #[test]
    fn test_update_same_tenant() {
        assert!(check_update(TenantScope::Tenant(id(1)), "notes", "n1", id(1), None).is_ok());
        assert!(check_update(TenantScope::Tenant(id(1)), "notes", "n1", id(1), Some(id(1))).is_ok());
    }

    #[test]
    fn test_update_foreign_record() {
        let err = check_update(TenantScope::Tenant(id(1)), "notes", "n1", id(2), None).unwrap_err();
        assert!(matches!(
            err,
            TenantError::TenantMismatch { expected, actual, .. } if expected == id(2) && actual == id(1)
        ));
    }

    #[test]
    fn test_update_cannot_change_owner() {
        let err =
            check_update(TenantScope::Tenant(id(1)), "notes", "n1", id(1), Some(id(2))).unwrap_err();
        assert!(matches!(err, TenantError::TenantMismatch { .. }));

        let err = check_update(TenantScope::Privileged, "notes", "n1", id(1), Some(id(2))).unwrap_err();
        assert!(matches!(err, TenantError::TenantMismatch { .. }));
    }

    #[test]
    fn test_privileged_update_override() {
        assert!(check_update(TenantScope::Privileged, "notes", "n1", id(3), None).is_ok());
        assert!(check_update(TenantScope::Privileged, "notes", "n1", id(3), Some(id(3))).is_ok());
    }

    #[test]
    fn test_delete() {
        assert!(check_delete(TenantScope::Tenant(id(1)), "notes", "n1", id(1)).is_ok());
        assert!(matches!(
            check_delete(TenantScope::Tenant(id(1)), "notes", "n1", id(2)),
            Err(TenantError::CrossTenantViolation { .. })
        ));
        assert!(check_delete(TenantScope::Privileged, "notes", "n1", id(2)).is_ok());
    }

    #[test]
    fn test_reassignment_requires_privilege() {
        assert!(check_reassignment(TenantScope::Privileged, "notes", "n1").is_ok());
        assert!(matches!(
            check_reassignment(TenantScope::Tenant(id(1)), "notes", "n1"),
            Err(TenantError::ReassignmentNotPermitted { .. })
        ));
    }
}
