//! Caller resolution.
//!
//! A [`CallerResolver`] turns the credentials presented with a request into a
//! [`CallerIdentity`]. Token validation itself lives outside this crate;
//! [`StaticTokenResolver`] is a fixed token table for development and tests.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use bastion_persistence::tenant::TenantId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::middleware::gate::{X_REQUEST_ID, X_TENANT_ID};

/// The role a caller acts in.
///
/// Only [`Role::Operator`] is privileged. Privilege is never inferred from
/// anything else about the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Platform operator; sees and manages every tenant.
    Operator,
    /// Administrator of one tenant.
    TenantAdmin,
    /// Regular member of one tenant.
    Member,
}

impl Role {
    /// Returns true if this role is granted the privileged scope.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Operator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Operator => write!(f, "operator"),
            Role::TenantAdmin => write!(f, "tenant-admin"),
            Role::Member => write!(f, "member"),
        }
    }
}

impl FromStr for Role {
    type Err = AuthenticationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operator" => Ok(Role::Operator),
            "tenant-admin" | "tenant_admin" => Ok(Role::TenantAdmin),
            "member" => Ok(Role::Member),
            other => Err(AuthenticationError::InvalidTokenTable {
                entry: other.to_string(),
                reason: "unknown role".to_string(),
            }),
        }
    }
}

/// Who is calling, as established by a [`CallerResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The caller's role.
    pub role: Role,
    /// The tenant the caller belongs to, if the identity carries one.
    pub tenant_id: Option<TenantId>,
    /// Stable subject identifier for audit logs.
    pub subject: Option<String>,
}

impl CallerIdentity {
    /// Creates an operator identity.
    pub fn operator() -> Self {
        Self {
            role: Role::Operator,
            tenant_id: None,
            subject: None,
        }
    }

    /// Creates an identity bound to one tenant.
    pub fn tenant(role: Role, tenant_id: TenantId) -> Self {
        Self {
            role,
            tenant_id: Some(tenant_id),
            subject: None,
        }
    }

    /// Sets the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// The raw request attributes a caller is resolved from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEvidence {
    /// Bearer token from the `Authorization` header.
    pub bearer_token: Option<String>,
    /// Raw `X-Tenant-ID` header value.
    pub tenant_header: Option<String>,
    /// Raw `X-Request-ID` header value.
    pub request_id: Option<String>,
}

impl RequestEvidence {
    /// Collects evidence from request headers.
    ///
    /// Fails with [`AuthenticationError::MalformedHeader`] when an
    /// `Authorization` header is present but is not a bearer token.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthenticationError> {
        let bearer_token = match headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| AuthenticationError::MalformedHeader)?;
                let token = value
                    .strip_prefix("Bearer ")
                    .or_else(|| value.strip_prefix("bearer "))
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .ok_or(AuthenticationError::MalformedHeader)?;
                Some(token.to_string())
            }
        };

        Ok(Self {
            bearer_token,
            tenant_header: header_string(headers, &X_TENANT_ID),
            request_id: header_string(headers, &X_REQUEST_ID),
        })
    }
}

/// Non-UTF-8 values are kept (lossily) so that they fail validation later
/// instead of reading as an absent header.
fn header_string(headers: &HeaderMap, name: &axum::http::HeaderName) -> Option<String> {
    let value = headers.get(name)?;
    let value = String::from_utf8_lossy(value.as_bytes());
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Errors raised while establishing who the caller is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// No credentials were presented.
    #[error("missing credentials")]
    MissingCredentials,

    /// The `Authorization` header is not a bearer token.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// The token is not recognised.
    #[error("unknown or expired token")]
    InvalidToken,

    /// A static token table entry could not be parsed.
    #[error("invalid token table entry '{entry}': {reason}")]
    InvalidTokenTable {
        /// The offending entry.
        entry: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Resolves the caller of a request.
///
/// Implementations validate credentials (JWT, session cookie, API key) and
/// report the caller's role and tenant. The access gate trusts what they
/// return.
#[async_trait]
pub trait CallerResolver: Send + Sync {
    /// Resolves the caller from request evidence.
    async fn resolve(&self, evidence: &RequestEvidence) -> Result<CallerIdentity, AuthenticationError>;
}

/// A fixed table of bearer tokens.
///
/// # Examples
///
/// ```
/// use bastion_rest::access::{Role, StaticTokenResolver};
///
/// let resolver = StaticTokenResolver::parse("ops=operator, acme=member:7").unwrap();
/// assert_eq!(resolver.len(), 2);
/// assert_eq!(resolver.identity("ops").unwrap().role, Role::Operator);
/// assert_eq!(resolver.identity("acme").unwrap().tenant_id.unwrap().get(), 7);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticTokenResolver {
    /// Creates an empty resolver that rejects every token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token.
    pub fn with_token(mut self, token: impl Into<String>, identity: CallerIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Parses a comma-separated `token=role[:tenant]` table.
    ///
    /// The token name doubles as the audit subject, prefixed with `token:`.
    pub fn parse(table: &str) -> Result<Self, AuthenticationError> {
        let mut resolver = Self::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = |reason: &str| AuthenticationError::InvalidTokenTable {
                entry: entry.to_string(),
                reason: reason.to_string(),
            };

            let (token, grant) = entry.split_once('=').ok_or_else(|| invalid("missing '='"))?;
            let token = token.trim();
            if token.is_empty() {
                return Err(invalid("empty token"));
            }

            let (role, tenant) = match grant.split_once(':') {
                Some((role, tenant)) => (role, Some(tenant)),
                None => (grant, None),
            };
            let role: Role = role.parse().map_err(|_| invalid("unknown role"))?;
            let tenant_id = tenant
                .map(|t| t.parse::<TenantId>())
                .transpose()
                .map_err(|_| invalid("tenant must be a positive integer"))?;
            if role.is_privileged() && tenant_id.is_some() {
                return Err(invalid("operators are not bound to a tenant"));
            }

            resolver.tokens.insert(
                token.to_string(),
                CallerIdentity {
                    role,
                    tenant_id,
                    subject: Some(format!("token:{}", token)),
                },
            );
        }
        Ok(resolver)
    }

    /// Looks up a token.
    pub fn identity(&self, token: &str) -> Option<&CallerIdentity> {
        self.tokens.get(token)
    }

    /// Number of configured tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no tokens are configured.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl CallerResolver for StaticTokenResolver {
    async fn resolve(&self, evidence: &RequestEvidence) -> Result<CallerIdentity, AuthenticationError> {
        let token = evidence
            .bearer_token
            .as_deref()
            .ok_or(AuthenticationError::MissingCredentials)?;
        self.identity(token)
            .cloned()
            .ok_or(AuthenticationError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn tenant(id: i64) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[test]
    fn test_only_operator_is_privileged() {
        assert!(Role::Operator.is_privileged());
        assert!(!Role::TenantAdmin.is_privileged());
        assert!(!Role::Member.is_privileged());
    }

    #[test]
    fn test_role_round_trips_through_display() {
        for role in [Role::Operator, Role::TenantAdmin, Role::Member] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("superadmin".parse::<Role>().is_err());
    }

    #[test]
    fn test_parse_token_table() {
        let resolver =
            StaticTokenResolver::parse("ops=operator, acme=tenant-admin:1,,bob=member").unwrap();
        assert_eq!(resolver.len(), 3);

        let acme = resolver.identity("acme").unwrap();
        assert_eq!(acme.role, Role::TenantAdmin);
        assert_eq!(acme.tenant_id, Some(tenant(1)));
        assert_eq!(acme.subject.as_deref(), Some("token:acme"));

        let bob = resolver.identity("bob").unwrap();
        assert_eq!(bob.tenant_id, None);
    }

    #[test]
    fn test_parse_empty_table() {
        assert!(StaticTokenResolver::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        for table in [
            "no-equals",
            "=member:1",
            "t=wizard",
            "t=member:0",
            "t=member:abc",
            "t=operator:3",
        ] {
            assert!(
                matches!(
                    StaticTokenResolver::parse(table),
                    Err(AuthenticationError::InvalidTokenTable { .. })
                ),
                "{table} should be rejected"
            );
        }
    }

    #[test]
    fn test_evidence_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(&X_TENANT_ID, HeaderValue::from_static(" 7 "));
        headers.insert(&X_REQUEST_ID, HeaderValue::from_static("req-1"));

        let evidence = RequestEvidence::from_headers(&headers).unwrap();
        assert_eq!(evidence.bearer_token.as_deref(), Some("abc"));
        assert_eq!(evidence.tenant_header.as_deref(), Some("7"));
        assert_eq!(evidence.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_evidence_keeps_non_utf8_tenant_header() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_TENANT_ID, HeaderValue::from_bytes(b"\xff1").unwrap());

        let evidence = RequestEvidence::from_headers(&headers).unwrap();
        let raw = evidence.tenant_header.expect("header kept");
        assert!(raw.parse::<bastion_persistence::tenant::TenantId>().is_err());
    }

    #[test]
    fn test_evidence_rejects_non_bearer_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(
            RequestEvidence::from_headers(&headers),
            Err(AuthenticationError::MalformedHeader)
        );
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticTokenResolver::new()
            .with_token("ops", CallerIdentity::operator().with_subject("alice"));

        let evidence = RequestEvidence {
            bearer_token: Some("ops".to_string()),
            ..Default::default()
        };
        let identity = resolver.resolve(&evidence).await.unwrap();
        assert_eq!(identity.role, Role::Operator);
        assert_eq!(identity.subject.as_deref(), Some("alice"));

        let missing = resolver.resolve(&RequestEvidence::default()).await;
        assert_eq!(missing, Err(AuthenticationError::MissingCredentials));

        let unknown = RequestEvidence {
            bearer_token: Some("nope".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolver.resolve(&unknown).await,
            Err(AuthenticationError::InvalidToken)
        );
    }
}
