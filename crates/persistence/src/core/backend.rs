//! Backend abstraction for database drivers.
//!
//! A backend hands out connections; the isolation layer does everything
//! else. Each connection carries its own filter state, so a backend only
//! needs to guarantee that a connection is never shared by two sessions at
//! the same time.

use std::fmt::Debug;

use async_trait::async_trait;

use super::connection::IsolationConnection;
use crate::error::StorageResult;

/// Identifies the type of database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// Process-local in-memory store.
    Memory,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A source of pooled, filter-capable connections.
#[async_trait]
pub trait IsolationBackend: Send + Sync + Debug {
    /// The connection type handed to sessions.
    type Connection: IsolationConnection + 'static;

    /// Returns the backend kind.
    fn kind(&self) -> BackendKind;

    /// Returns the backend name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Checks a connection out of the pool.
    ///
    /// The returned connection must have no filter enabled. Returning it to
    /// the pool is done by dropping it.
    async fn acquire(&self) -> StorageResult<Self::Connection>;

    /// Verifies the backend is reachable without touching tenant data.
    async fn health_check(&self) -> StorageResult<()>;
}
