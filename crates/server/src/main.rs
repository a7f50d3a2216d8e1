//! Bastion server
//!
//! Multi-tenant API server with tenant-scoped data isolation.

use bastion_persistence::isolation::IsolatedStore;
use bastion_rest::{ServerConfig, create_app, init_logging};
use clap::Parser;
use tracing::info;

#[cfg(feature = "sqlite")]
use bastion_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};

/// Creates and initializes a SQLite backend from the server configuration.
///
/// Without a database URL an in-memory database is used; its pool is always a
/// single shared connection.
#[cfg(feature = "sqlite")]
fn create_sqlite_backend(config: &ServerConfig) -> anyhow::Result<SqliteBackend> {
    let db_path = config.database_url.as_deref().unwrap_or(":memory:");
    info!(database = %db_path, "Initializing SQLite backend");

    let backend_config = SqliteBackendConfig {
        max_connections: config.max_connections,
        ..Default::default()
    };

    let backend = SqliteBackend::with_config(db_path, backend_config)?;
    backend.init_schema()?;

    Ok(backend)
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        strict_tenant = config.strict_tenant,
        "Starting Bastion server"
    );

    start(config).await
}

#[cfg(feature = "sqlite")]
async fn start(config: ServerConfig) -> anyhow::Result<()> {
    let backend = create_sqlite_backend(&config)?;
    let app = create_app(IsolatedStore::new(backend), config.clone())?;
    serve(app, &config).await
}

/// Falls back to the in-memory backend when sqlite is not enabled.
#[cfg(not(feature = "sqlite"))]
async fn start(config: ServerConfig) -> anyhow::Result<()> {
    use bastion_persistence::backends::memory::MemoryBackend;

    tracing::warn!("Built without the 'sqlite' feature; data is kept in process memory only");
    let app = create_app(IsolatedStore::new(MemoryBackend::new()), config.clone())?;
    serve(app, &config).await
}
