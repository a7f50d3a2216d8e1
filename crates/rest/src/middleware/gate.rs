//! Access gate middleware.
//!
//! Resolves the caller, decides the scope and attaches a [`GrantedScope`] to
//! the request extensions. Business routes are mounted behind this layer;
//! a request it rejects never reaches a handler.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header::HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bastion_persistence::core::IsolationBackend;
use bastion_persistence::isolation::AUDIT_TARGET;
use bastion_persistence::tenant::{RequestContext, TenantScope};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::access::{AccessGate, CallerIdentity, CallerResolver, GateError, RequestEvidence};
use crate::error::RestError;
use crate::state::AppState;

/// Header naming the tenant a request targets.
pub static X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");

/// Header carrying the request correlation id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The outcome of the access gate for one request.
#[derive(Debug, Clone)]
pub struct GrantedScope {
    /// The scope the request runs under.
    pub scope: TenantScope,
    /// Who is calling.
    pub identity: CallerIdentity,
    /// Correlation id for logs and audit events.
    pub correlation_id: String,
}

impl GrantedScope {
    /// Builds the unbound request context handlers pass to the store.
    pub fn request_context(&self) -> RequestContext {
        let ctx = RequestContext::new().with_correlation_id(self.correlation_id.clone());
        match &self.identity.subject {
            Some(subject) => ctx.with_user_id(subject.clone()),
            None => ctx,
        }
    }
}

/// Resolves the caller behind `headers` and decides its scope.
pub async fn grant(
    resolver: &dyn CallerResolver,
    gate: &AccessGate,
    headers: &HeaderMap,
) -> Result<(CallerIdentity, TenantScope), GateError> {
    let evidence = RequestEvidence::from_headers(headers)?;
    let identity = resolver.resolve(&evidence).await?;
    let scope = gate.decide(&identity, evidence.tenant_header.as_deref())?;
    Ok((identity, scope))
}

/// Middleware function for the access gate.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn access_gate<B>(
    State(state): State<AppState<B>>,
    mut request: Request,
    next: Next,
) -> Response
where
    B: IsolationBackend + 'static,
{
    let correlation_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = grant(state.resolver(), state.gate(), request.headers()).await;
    let mut response = match outcome {
        Ok((identity, scope)) => {
            debug!(
                correlation_id = %correlation_id,
                role = %identity.role,
                scope = %scope,
                "Access granted"
            );
            request.extensions_mut().insert(GrantedScope {
                scope,
                identity,
                correlation_id: correlation_id.clone(),
            });
            next.run(request).await
        }
        Err(err) => {
            warn!(
                target: AUDIT_TARGET,
                correlation_id = %correlation_id,
                method = %request.method(),
                path = %request.uri().path(),
                code = err.code(),
                error = %err,
                "Access gate rejected request"
            );
            RestError::from(err).into_response()
        }
    };

    if state.config().enable_request_id
        && let Ok(value) = HeaderValue::from_str(&correlation_id)
    {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}
