//! Server configuration for the Bastion REST API.
//!
//! This module provides configuration types for the REST server, supporting
//! both programmatic configuration and environment variable overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BASTION_SERVER_PORT` | 8080 | Server port |
//! | `BASTION_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `BASTION_LOG_LEVEL` | info | Log level |
//! | `BASTION_MAX_BODY_SIZE` | 1048576 | Max request body (bytes) |
//! | `BASTION_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `BASTION_ENABLE_CORS` | true | Enable CORS |
//! | `BASTION_CORS_ORIGINS` | * | Allowed origins |
//! | `BASTION_CORS_METHODS` | GET,POST,PUT,DELETE,OPTIONS | Allowed methods |
//! | `BASTION_CORS_HEADERS` | Content-Type,Authorization,Accept,X-Tenant-ID,X-Request-ID | Allowed headers |
//! | `BASTION_DATABASE_URL` | (in-memory) | SQLite database path |
//! | `BASTION_MAX_CONNECTIONS` | 10 | Connection pool size |
//! | `BASTION_AUTH_TOKENS` | (none) | Static bearer tokens, `token=role[:tenant],...` |
//! | `BASTION_STRICT_TENANT` | true | Reject a tenant header that disagrees with the caller |
//!
//! # Example
//!
//! ```rust
//! use bastion_rest::ServerConfig;
//!
//! // Create from environment
//! let config = ServerConfig::from_env();
//!
//! // Or create programmatically
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     auth_tokens: "ops-token=operator".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::Parser;

use crate::access::StaticTokenResolver;

/// Server configuration for the Bastion REST API.
///
/// This struct can be constructed from environment variables using [`ServerConfig::from_env`],
/// from command line arguments using [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "bastion-server")]
#[command(about = "Multi-tenant API server with tenant-scoped data isolation")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "BASTION_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "BASTION_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "BASTION_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "BASTION_MAX_BODY_SIZE", default_value = "1048576")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "BASTION_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "BASTION_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "BASTION_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "BASTION_CORS_METHODS",
        default_value = "GET,POST,PUT,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "BASTION_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,X-Tenant-ID,X-Request-ID"
    )]
    pub cors_headers: String,

    /// SQLite database path. Without one an in-memory database is used.
    #[arg(long, env = "BASTION_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum number of pooled database connections.
    #[arg(long, env = "BASTION_MAX_CONNECTIONS", default_value = "10")]
    pub max_connections: u32,

    /// Static bearer tokens for development and tests.
    ///
    /// Comma-separated `token=role[:tenant]` entries, for example
    /// `ops=operator,acme-admin=tenant-admin:1,acme-user=member:1`.
    #[arg(long, env = "BASTION_AUTH_TOKENS", default_value = "")]
    pub auth_tokens: String,

    /// Reject requests whose `X-Tenant-ID` header names a different tenant
    /// than the caller's identity.
    #[arg(long, env = "BASTION_STRICT_TENANT", default_value = "true")]
    pub strict_tenant: bool,

    /// Echo or generate an `X-Request-ID` for every request.
    #[arg(long, env = "BASTION_ENABLE_REQUEST_ID", default_value = "true")]
    pub enable_request_id: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,X-Tenant-ID,X-Request-ID".to_string(),
            database_url: None,
            max_connections: 10,
            auth_tokens: String::new(),
            strict_tenant: true,
            enable_request_id: true,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        // Try to parse from environment, falling back to defaults
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections cannot be 0".to_string());
        }

        if let Err(e) = StaticTokenResolver::parse(&self.auth_tokens) {
            errors.push(format!("Invalid auth tokens: {}", e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0, disables CORS and installs a fixed token
    /// table: `operator-token` (operator), `acme-admin` (tenant admin of
    /// tenant 1), `acme-member` (member of tenant 1), `globex-member`
    /// (member of tenant 2) and `floating-member` (member without a tenant).
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            max_body_size: 1024 * 1024,
            request_timeout: 5, // Shorter timeout for tests
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            database_url: None,
            max_connections: 1,
            auth_tokens: "operator-token=operator,acme-admin=tenant-admin:1,\
                          acme-member=member:1,globex-member=member:2,\
                          floating-member=member"
                .to_string(),
            strict_tenant: true,
            enable_request_id: false,
        }
    }
}
