//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{BackendKind, IsolationBackend};
use crate::error::{BackendError, StorageError, StorageResult};

use super::connection::SqliteConnection;
use super::manager::ScopedConnectionManager;
use super::schema;

pub(crate) const BACKEND_NAME: &str = "sqlite";

/// SQLite backend with a pool of filter-tracking connections.
pub struct SqliteBackend {
    pool: Pool<ScopedConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    /// Keeps a shared in-memory database alive while pooled connections are
    /// recycled.
    _memory_anchor: Option<Mutex<Connection>>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .field("pool_size", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection checkout timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    ///
    /// In-memory databases are served by a single pooled connection, so
    /// consecutive sessions run on the very same connection.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        // Every connection to a plain ":memory:" path would open its own
        // empty database, so in-memory mode uses a uniquely named shared one.
        let (manager, anchor, max_size) = if is_memory {
            let uri = format!("file:bastion-{}?mode=memory&cache=shared", Uuid::new_v4());
            let anchor = Connection::open(&uri).map_err(|e| connection_failed(e.to_string()))?;
            (SqliteConnectionManager::file(uri), Some(Mutex::new(anchor)), 1)
        } else {
            (
                SqliteConnectionManager::file(path.as_ref()),
                None,
                config.max_connections,
            )
        };

        let manager = ScopedConnectionManager::new(
            manager,
            Duration::from_millis(config.busy_timeout_ms as u64),
            config.enable_foreign_keys,
        );

        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(config.min_connections.min(max_size)))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| connection_failed(e.to_string()))?;

        let backend = Self {
            pool,
            config,
            is_memory,
            _memory_anchor: anchor,
        };

        backend.configure_database()?;
        info!(
            backend = BACKEND_NAME,
            in_memory = is_memory,
            max_connections = max_size,
            "SQLite backend ready"
        );

        Ok(backend)
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(&self) -> StorageResult<PooledConnection<ScopedConnectionManager>> {
        self.pool.get().map_err(|e| {
            debug!(error = %e, "SQLite pool checkout failed");
            StorageError::Backend(BackendError::PoolExhausted {
                backend_name: BACKEND_NAME.to_string(),
            })
        })
    }

    /// Applies database-wide settings.
    fn configure_database(&self) -> StorageResult<()> {
        if self.config.enable_wal && !self.is_memory {
            let conn = self.get_connection()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: BACKEND_NAME.to_string(),
                    message: format!("Failed to enable WAL mode: {}", e),
                    source: None,
                })
            })?;
        }
        Ok(())
    }

    /// Checks a connection out of the pool on the blocking thread pool.
    ///
    /// A session holds its connection across awaits, so waiting for a free
    /// one must not park an executor thread that the holder may need.
    async fn checkout(&self) -> StorageResult<PooledConnection<ScopedConnectionManager>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: BACKEND_NAME.to_string(),
                    message: format!("Connection checkout task failed: {}", e),
                    source: None,
                })
            })?
            .map_err(|e| {
                debug!(error = %e, "SQLite pool checkout failed");
                StorageError::Backend(BackendError::PoolExhausted {
                    backend_name: BACKEND_NAME.to_string(),
                })
            })
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    /// Returns the number of connections currently open in the pool.
    pub fn open_connections(&self) -> u32 {
        self.pool.state().connections
    }
}

#[async_trait]
impl IsolationBackend for SqliteBackend {
    type Connection = SqliteConnection;

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn acquire(&self) -> StorageResult<Self::Connection> {
        Ok(SqliteConnection::new(self.checkout().await?))
    }

    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.checkout().await.map_err(|_| {
            StorageError::Backend(BackendError::Unavailable {
                backend_name: BACKEND_NAME.to_string(),
                message: "Failed to get connection".to_string(),
            })
        })?;
        conn.query_row("SELECT 1", [], |_| Ok(())).map_err(|e| {
            StorageError::Backend(BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("Health check failed: {}", e),
                source: None,
            })
        })?;
        Ok(())
    }
}

fn connection_failed(message: String) -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: BACKEND_NAME.to_string(),
        message,
    })
}
