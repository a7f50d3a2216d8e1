//! Scope decisions for resolved callers.

use bastion_persistence::tenant::{TenantId, TenantScope};
use thiserror::Error;
use tracing::debug;

use super::caller::{AuthenticationError, CallerIdentity, Role};

/// What kind of operation a route performs.
///
/// Authentication, health and onboarding routes are exempt from the gate:
/// they are mounted outside it, never receive a scope and never touch
/// tenant-owned data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCategory {
    /// Login, token exchange.
    Authentication,
    /// Liveness and readiness probes.
    Health,
    /// Tenant sign-up before a tenant exists.
    Onboarding,
    /// Everything that reads or writes tenant-owned data.
    Business,
}

impl OperationCategory {
    /// Returns true if routes of this category bypass the gate.
    pub fn is_exempt(&self) -> bool {
        !matches!(self, OperationCategory::Business)
    }
}

/// Why the gate refused to grant a scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The caller could not be resolved.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// A non-operator caller with no tenant from either source.
    #[error("no tenant context for {role} caller")]
    MissingTenantContext {
        /// The caller's role.
        role: Role,
    },

    /// The caller's own tenant and the requested tenant differ.
    #[error("caller belongs to tenant {identity} but the request names tenant {requested}")]
    ConflictingTenant {
        /// Tenant from the caller identity.
        identity: TenantId,
        /// Tenant from the request attribute.
        requested: TenantId,
    },

    /// The request's tenant attribute is not a positive integer.
    #[error("invalid tenant attribute '{value}'")]
    InvalidScope {
        /// The raw attribute value.
        value: String,
    },
}

impl GateError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Authentication(_) => "unauthenticated",
            GateError::MissingTenantContext { .. } => "missing-tenant-context",
            GateError::ConflictingTenant { .. } => "conflicting-tenant",
            GateError::InvalidScope { .. } => "invalid-scope",
        }
    }
}

/// Decides the scope a request runs under.
///
/// | Caller | Identity tenant | `X-Tenant-ID` | Scope |
/// |--------|-----------------|---------------|-------|
/// | operator | any | any | `Privileged` |
/// | other | `T` | absent or `T` | `Tenant(T)` |
/// | other | `T` | `U != T` | `ConflictingTenant` (strict) or `Tenant(T)` |
/// | other | none | `U` | `Tenant(U)` |
/// | other | none | absent | `MissingTenantContext` |
///
/// # Examples
///
/// ```
/// use bastion_persistence::tenant::{TenantId, TenantScope};
/// use bastion_rest::access::{AccessGate, CallerIdentity, Role};
///
/// let gate = AccessGate::new(true);
/// let member = CallerIdentity::tenant(Role::Member, TenantId::new(3).unwrap());
///
/// assert_eq!(gate.decide(&member, None).unwrap(), TenantScope::tenant(3).unwrap());
/// assert!(gate.decide(&member, Some("4")).is_err());
/// assert_eq!(
///     gate.decide(&CallerIdentity::operator(), Some("4")).unwrap(),
///     TenantScope::Privileged
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AccessGate {
    strict: bool,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AccessGate {
    /// Creates a gate. In strict mode a tenant attribute that disagrees with
    /// the caller's own tenant is rejected instead of ignored.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Returns whether conflicting tenant attributes are rejected.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Decides the scope for `identity`, given the raw tenant attribute of the
    /// request.
    pub fn decide(
        &self,
        identity: &CallerIdentity,
        requested: Option<&str>,
    ) -> Result<TenantScope, GateError> {
        if identity.role.is_privileged() {
            if let Some(requested) = requested {
                debug!(requested, "Ignoring tenant attribute for operator caller");
            }
            return Ok(TenantScope::Privileged);
        }

        let requested = requested
            .map(|raw| {
                raw.parse::<TenantId>()
                    .map_err(|_| GateError::InvalidScope {
                        value: raw.to_string(),
                    })
            })
            .transpose()?;

        match (identity.tenant_id, requested) {
            (Some(own), Some(requested)) if own != requested => {
                if self.strict {
                    Err(GateError::ConflictingTenant {
                        identity: own,
                        requested,
                    })
                } else {
                    debug!(%own, %requested, "Ignoring conflicting tenant attribute");
                    Ok(TenantScope::Tenant(own))
                }
            }
            (Some(own), _) => Ok(TenantScope::Tenant(own)),
            (None, Some(requested)) => Ok(TenantScope::Tenant(requested)),
            (None, None) => Err(GateError::MissingTenantContext {
                role: identity.role,
            }),
        }
    }
}
