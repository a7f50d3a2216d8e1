//! Granted scope extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use bastion_persistence::tenant::{RequestContext, TenantScope};
use tracing::error;

use crate::access::CallerIdentity;
use crate::error::RestError;
use crate::middleware::GrantedScope;

/// Axum extractor for the scope the access gate granted.
///
/// Fails closed: a handler mounted without the gate in front of it gets a
/// 403 `unscoped-access` instead of running unscoped.
///
/// # Example
///
/// ```rust,ignore
/// use bastion_rest::extractors::Scoped;
///
/// async fn handler(scoped: Scoped) {
///     println!("Running under {}", scoped.scope());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Scoped(pub GrantedScope);

impl Scoped {
    /// Returns the granted scope.
    pub fn scope(&self) -> TenantScope {
        self.0.scope
    }

    /// Returns the caller identity.
    pub fn identity(&self) -> &CallerIdentity {
        &self.0.identity
    }

    /// Builds an unbound request context for store calls.
    pub fn context(&self) -> RequestContext {
        self.0.request_context()
    }
}

impl<S> FromRequestParts<S> for Scoped
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<GrantedScope>() {
            Some(granted) => Ok(Scoped(granted.clone())),
            None => {
                error!(path = %parts.uri.path(), "Business handler reached without a granted scope");
                Err(RestError::Forbidden {
                    code: "unscoped-access",
                    message: "no scope granted for request".to_string(),
                })
            }
        }
    }
}
