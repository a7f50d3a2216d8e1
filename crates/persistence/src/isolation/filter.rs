//! Owner predicate injection.

use crate::error::{TenantError, TenantResult};
use crate::tenant::{RequestContext, TenantScope};
use crate::types::OwnerFilter;

/// Scopes a query to the context's binding before it reaches a backend.
///
/// - `Tenant(T)` ANDs an owner predicate for `T` into the query, so a caller
///   supplied predicate can only narrow the result further.
/// - `Privileged` leaves the query untouched.
/// - No binding fails with [`TenantError::UnscopedAccess`] and the query is
///   never issued.
///
/// Returns the scope the query was filtered for.
///
/// # Examples
///
/// ```
/// use bastion_persistence::isolation::scope_query;
/// use bastion_persistence::tenant::{RequestContext, TenantScope};
/// use bastion_persistence::types::{OwnerFilter, RecordQuery};
///
/// let mut ctx = RequestContext::new();
/// let mut query = RecordQuery::new("notes");
/// assert!(scope_query(&ctx, &mut query, "list notes").is_err());
///
/// let guard = ctx.bind(TenantScope::tenant(2).unwrap()).unwrap();
/// scope_query(guard.context(), &mut query, "list notes").unwrap();
/// assert_eq!(query.owner_restrictions().len(), 1);
/// ```
pub fn scope_query<Q: OwnerFilter>(
    context: &RequestContext,
    query: &mut Q,
    operation: &str,
) -> TenantResult<TenantScope> {
    let scope = context
        .current()
        .ok_or_else(|| TenantError::UnscopedAccess {
            operation: operation.to_string(),
        })?;

    if let TenantScope::Tenant(tenant) = scope {
        query.restrict_to_owner(tenant);
    }

    Ok(scope)
}
