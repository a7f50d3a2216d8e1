//! The tenant scope bound to a unit of work.

use std::fmt;

use super::id::TenantId;
use crate::error::TenantError;

/// The isolation boundary an operation runs under.
///
/// A scope is either a single tenant, which confines every read and write to
/// records owned by that tenant, or `Privileged`, which lifts the row filter
/// for operator work. `Privileged` is only ever granted by the access gate
/// based on role.
///
/// # Examples
///
/// ```
/// use bastion_persistence::tenant::{TenantId, TenantScope};
///
/// let scope = TenantScope::tenant(42).unwrap();
/// assert_eq!(scope.tenant_id(), Some(TenantId::new(42).unwrap()));
/// assert!(!scope.is_privileged());
///
/// assert!(TenantScope::privileged().is_privileged());
/// assert!(TenantScope::tenant(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantScope {
    /// Confined to records owned by one tenant.
    Tenant(TenantId),
    /// Unfiltered operator access.
    Privileged,
}

impl TenantScope {
    /// Creates a tenant scope from a raw id.
    pub fn tenant(id: i64) -> Result<Self, TenantError> {
        TenantId::new(id).map(TenantScope::Tenant)
    }

    /// The unfiltered operator scope.
    pub fn privileged() -> Self {
        TenantScope::Privileged
    }

    /// Returns the tenant id, or `None` for the privileged scope.
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            TenantScope::Tenant(id) => Some(*id),
            TenantScope::Privileged => None,
        }
    }

    /// Returns true for the privileged scope.
    pub fn is_privileged(&self) -> bool {
        matches!(self, TenantScope::Privileged)
    }

    /// Returns true if a record owned by `owner` is visible in this scope.
    pub fn permits(&self, owner: TenantId) -> bool {
        match self {
            TenantScope::Tenant(id) => *id == owner,
            TenantScope::Privileged => true,
        }
    }
}

impl From<TenantId> for TenantScope {
    fn from(id: TenantId) -> Self {
        TenantScope::Tenant(id)
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantScope::Tenant(id) => write!(f, "tenant:{}", id),
            TenantScope::Privileged => write!(f, "privileged"),
        }
    }
}
