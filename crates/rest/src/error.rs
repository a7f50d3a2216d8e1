//! Error types for the Bastion REST API.
//!
//! This module defines the error type returned by handlers and middleware,
//! with automatic conversion to JSON error responses.
//!
//! Response bodies carry a stable machine code and a generic message only:
//!
//! ```json
//! {"error": {"code": "cross-tenant-violation", "message": "Access denied"}}
//! ```
//!
//! Tenant ids, record ids and other detail go to the logs, never to the
//! client.
//!
//! # Error Mapping
//!
//! | Source | HTTP Status | Code |
//! |--------|-------------|------|
//! | `RecordError::NotFound` | 404 | `not-found` |
//! | `RecordError::AlreadyExists`, `VersionConflict` | 409 | `conflict` |
//! | `ValidationError`, malformed JSON | 400 | `invalid-request` |
//! | `TenantError::InvalidScope`, `GateError::InvalidScope` | 400 | `invalid-scope` |
//! | `TenantError::MissingTenant` | 400 | `missing-tenant` |
//! | `GateError::Authentication` | 401 | `unauthenticated` |
//! | isolation violations, unscoped access | 403 | the `TenantError` code |
//! | `GateError::MissingTenantContext`, `ConflictingTenant` | 403 | the `GateError` code |
//! | `BackendError`, `AlreadyBound` | 500 | `internal-error` |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bastion_persistence::error::{
    ConcurrencyError, RecordError, StorageError, TenantError, ValidationError,
};
use std::fmt;
use tracing::{debug, error};

use crate::access::GateError;

/// The primary error type for REST API operations.
///
/// Each variant carries the detail for logging; [`IntoResponse`] reduces it
/// to a status, a code and a generic message.
#[derive(Debug)]
pub enum RestError {
    /// Record not found or not visible in the caller's scope (HTTP 404).
    NotFound {
        /// The collection.
        collection: String,
        /// The record id.
        id: String,
    },

    /// Write conflict (HTTP 409).
    Conflict {
        /// Detail for the logs.
        message: String,
    },

    /// Bad request (HTTP 400).
    BadRequest {
        /// Machine code.
        code: &'static str,
        /// Error message.
        message: String,
    },

    /// The caller could not be authenticated (HTTP 401).
    Unauthorized {
        /// Detail for the logs.
        message: String,
    },

    /// Access denied (HTTP 403).
    Forbidden {
        /// Machine code.
        code: &'static str,
        /// Detail for the logs.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Detail for the logs.
        message: String,
    },
}

impl RestError {
    /// Creates a 400 with the generic `invalid-request` code.
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest {
            code: "invalid-request",
            message: message.into(),
        }
    }

    /// Creates a 403 with the generic `forbidden` code.
    pub fn forbidden(message: impl Into<String>) -> Self {
        RestError::Forbidden {
            code: "forbidden",
            message: message.into(),
        }
    }

    /// Returns the HTTP status code.
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::Conflict { .. } => StatusCode::CONFLICT,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RestError::NotFound { .. } => "not-found",
            RestError::Conflict { .. } => "conflict",
            RestError::BadRequest { code, .. } => code,
            RestError::Unauthorized { .. } => "unauthenticated",
            RestError::Forbidden { code, .. } => code,
            RestError::InternalError { .. } => "internal-error",
        }
    }

    /// Returns the message sent to the client.
    fn public_message(&self) -> String {
        match self {
            RestError::NotFound { .. } => "Record not found".to_string(),
            RestError::Conflict { .. } => "The record was changed by another request".to_string(),
            RestError::BadRequest { message, .. } => message.clone(),
            RestError::Unauthorized { .. } => "Authentication required".to_string(),
            RestError::Forbidden { .. } => "Access denied".to_string(),
            RestError::InternalError { .. } => "Internal server error".to_string(),
        }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound { collection, id } => {
                write!(f, "Record not found: {}/{}", collection, id)
            }
            RestError::Conflict { message } => write!(f, "Conflict: {}", message),
            RestError::BadRequest { message, .. } => write!(f, "Bad request: {}", message),
            RestError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
            RestError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
            RestError::InternalError { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RestError {}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        } else {
            debug!(code = self.code(), error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// Implement conversions from storage errors

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Tenant(e) => e.into(),
            StorageError::Record(e) => e.into(),
            StorageError::Concurrency(e) => e.into(),
            StorageError::Validation(e) => e.into(),
            StorageError::Backend(e) => RestError::InternalError {
                message: e.to_string(),
            },
        }
    }
}

impl From<TenantError> for RestError {
    fn from(err: TenantError) -> Self {
        let code = err.code();
        match err {
            TenantError::InvalidScope { .. } | TenantError::MissingTenant { .. } => {
                RestError::BadRequest {
                    code,
                    message: err.to_string(),
                }
            }
            TenantError::AlreadyBound { .. } => RestError::InternalError {
                message: err.to_string(),
            },
            TenantError::UnscopedAccess { .. }
            | TenantError::CrossTenantViolation { .. }
            | TenantError::TenantMismatch { .. }
            | TenantError::ReassignmentNotPermitted { .. } => RestError::Forbidden {
                code,
                message: err.to_string(),
            },
        }
    }
}

impl From<RecordError> for RestError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound { collection, id } => RestError::NotFound { collection, id },
            RecordError::AlreadyExists { .. } => RestError::Conflict {
                message: err.to_string(),
            },
        }
    }
}

impl From<ConcurrencyError> for RestError {
    fn from(err: ConcurrencyError) -> Self {
        RestError::Conflict {
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for RestError {
    fn from(err: ValidationError) -> Self {
        RestError::bad_request(err.to_string())
    }
}

impl From<GateError> for RestError {
    fn from(err: GateError) -> Self {
        let code = err.code();
        match err {
            GateError::Authentication(e) => RestError::Unauthorized {
                message: e.to_string(),
            },
            GateError::InvalidScope { .. } => RestError::BadRequest {
                code,
                message: "X-Tenant-ID must be a positive integer".to_string(),
            },
            GateError::MissingTenantContext { .. } | GateError::ConflictingTenant { .. } => {
                RestError::Forbidden {
                    code,
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::bad_request(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;
