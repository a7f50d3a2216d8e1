//! Request context carrying the tenant scope.
//!
//! This module defines [`RequestContext`], the explicit context object that
//! travels with one unit of work (one request, one job) and holds the active
//! [`TenantScope`]. There is no ambient "current tenant": whoever needs the
//! scope receives the context, and concurrent units never share one.

use tracing::debug;

use super::scope::TenantScope;
use crate::error::{TenantError, TenantResult};

/// Per-unit-of-work context holding the active tenant scope.
///
/// A fresh context is unbound. Binding is done with [`bind`](Self::bind),
/// which returns a [`ScopeGuard`] that releases the binding when dropped, so
/// the scope is cleared on normal return, on `?` early returns, on unwinding,
/// and when an enclosing future is cancelled.
///
/// The context is deliberately not `Clone`: a copy would carry the binding
/// past the guard that owns it. Use [`fork`](Self::fork) to hand the request
/// metadata to a sub-operation without the binding.
///
/// # Examples
///
/// ```
/// use bastion_persistence::tenant::{RequestContext, TenantScope};
///
/// let mut ctx = RequestContext::new().with_correlation_id("req-1");
/// assert_eq!(ctx.current(), None);
///
/// {
///     let guard = ctx.bind(TenantScope::tenant(7).unwrap()).unwrap();
///     assert_eq!(guard.current(), Some(TenantScope::tenant(7).unwrap()));
/// }
///
/// assert_eq!(ctx.current(), None);
/// ```
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Optional correlation ID for request tracing.
    correlation_id: Option<String>,
    /// Optional user ID for audit purposes.
    user_id: Option<String>,
    /// The active binding; `None` means unbound.
    scope: Option<TenantScope>,
}

impl RequestContext {
    /// Creates an unbound context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with the specified correlation ID for tracing.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Creates a context with the specified user ID for auditing.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns the correlation ID, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the user ID, if set.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the active scope, or `None` when unbound.
    pub fn current(&self) -> Option<TenantScope> {
        self.scope
    }

    /// Returns `true` if a scope is bound.
    pub fn is_bound(&self) -> bool {
        self.scope.is_some()
    }

    /// Returns the active scope, failing closed when unbound.
    ///
    /// Write paths call this before touching the store; an unbound context
    /// yields [`TenantError::UnscopedAccess`] naming `operation`.
    pub fn require_for_write(&self, operation: &str) -> TenantResult<TenantScope> {
        self.scope.ok_or_else(|| TenantError::UnscopedAccess {
            operation: operation.to_string(),
        })
    }

    /// Binds `scope` for the lifetime of the returned guard.
    ///
    /// Fails with [`TenantError::AlreadyBound`] if a binding is already
    /// active; replacing a live binding requires [`ScopeGuard::rebind`].
    pub fn bind(&mut self, scope: TenantScope) -> TenantResult<ScopeGuard<'_>> {
        self.attach(scope)?;
        Ok(ScopeGuard { context: self })
    }

    /// Copies the request metadata into a new, unbound context.
    pub fn fork(&self) -> RequestContext {
        RequestContext {
            correlation_id: self.correlation_id.clone(),
            user_id: self.user_id.clone(),
            scope: None,
        }
    }

    /// Creates a bound child of this context.
    ///
    /// The child owns its binding, which ends when the child is released or
    /// dropped. Entering from an already bound context is a nesting attempt
    /// and fails with [`TenantError::AlreadyBound`].
    pub(crate) fn enter(&self, scope: TenantScope) -> TenantResult<RequestContext> {
        if let Some(current) = self.scope {
            return Err(TenantError::AlreadyBound { current });
        }
        let mut child = self.fork();
        child.attach(scope)?;
        Ok(child)
    }

    /// Replaces the binding, returning the previous one.
    pub(crate) fn replace(&mut self, scope: TenantScope) -> Option<TenantScope> {
        let previous = self.scope.replace(scope);
        debug!(
            correlation_id = self.correlation_id.as_deref(),
            previous = ?previous,
            scope = %scope,
            "Tenant scope rebound"
        );
        previous
    }

    /// Clears the binding. Returns what was bound, if anything.
    pub(crate) fn release(&mut self) -> Option<TenantScope> {
        let released = self.scope.take();
        if let Some(scope) = released {
            debug!(
                correlation_id = self.correlation_id.as_deref(),
                scope = %scope,
                "Tenant scope released"
            );
        }
        released
    }

    fn attach(&mut self, scope: TenantScope) -> TenantResult<()> {
        if let Some(current) = self.scope {
            return Err(TenantError::AlreadyBound { current });
        }
        self.scope = Some(scope);
        debug!(
            correlation_id = self.correlation_id.as_deref(),
            user_id = self.user_id.as_deref(),
            scope = %scope,
            "Tenant scope bound"
        );
        Ok(())
    }
}

/// Holds a scope binding on a [`RequestContext`] and releases it on drop.
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    context: &'a mut RequestContext,
}

impl ScopeGuard<'_> {
    /// Returns the scope bound through this guard.
    pub fn current(&self) -> Option<TenantScope> {
        self.context.current()
    }

    /// Returns the underlying context for read access.
    pub fn context(&self) -> &RequestContext {
        self.context
    }

    /// Overwrites the binding, returning the scope it replaced.
    pub fn rebind(&mut self, scope: TenantScope) -> Option<TenantScope> {
        self.context.replace(scope)
    }

    /// Releases the binding now instead of at the end of the enclosing block.
    pub fn unbind(self) {}
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.context.release();
    }
}
