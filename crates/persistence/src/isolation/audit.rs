//! Audit events for isolation decisions.

use tracing::{info, warn};

use crate::core::OwnerReassignment;
use crate::error::TenantError;
use crate::tenant::RequestContext;

/// Tracing target that carries isolation audit events.
pub const AUDIT_TARGET: &str = "bastion::audit";

/// Logs a rejected operation with full tenant and record detail.
///
/// Detail stays in the log; callers surface only the error kind.
pub(crate) fn record_rejection(context: &RequestContext, err: &TenantError) {
    warn!(
        target: AUDIT_TARGET,
        correlation_id = context.correlation_id(),
        user_id = context.user_id(),
        scope = ?context.current(),
        code = err.code(),
        violation = err.is_violation(),
        error = %err,
        "Isolation check rejected operation"
    );
}

/// Logs an administrative owner change.
pub(crate) fn record_reassignment(context: &RequestContext, change: &OwnerReassignment) {
    info!(
        target: AUDIT_TARGET,
        correlation_id = context.correlation_id(),
        user_id = context.user_id(),
        collection = %change.collection,
        id = %change.id,
        from = %change.from,
        to = %change.to,
        "Record owner reassigned"
    );
}
