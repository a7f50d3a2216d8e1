//! # bastion-rest - HTTP surface for tenant-scoped data
//!
//! This crate puts an [axum](https://docs.rs/axum) API in front of
//! [`bastion_persistence`]. It decides, once per request, which tenant scope
//! the request runs under, and hands that scope to handlers that do all of
//! their store work inside scoped sessions.
//!
//! ## Request flow
//!
//! ```text
//! request -> TraceLayer -> access gate -> handler -> IsolatedStore::with_scope
//!              |              |
//!              |              +-- CallerResolver + AccessGate -> GrantedScope
//!              +-- exempt routes (health) skip the gate
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bastion_persistence::backends::sqlite::SqliteBackend;
//! use bastion_persistence::isolation::IsolatedStore;
//! use bastion_rest::{ServerConfig, create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::open("bastion.db")?;
//!     backend.init_schema()?;
//!
//!     let config = ServerConfig {
//!         auth_tokens: "ops=operator,acme=member:1".to_string(),
//!         ..Default::default()
//!     };
//!     let app = create_app(IsolatedStore::new(backend), config)?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## HTTP Headers
//!
//! - `Authorization: Bearer <token>` - Caller credentials
//! - `X-Tenant-ID` - Tenant the request targets, for callers whose identity
//!   does not carry one
//! - `X-Request-ID` - Correlation id, echoed back when enabled
//!
//! ## Error Handling
//!
//! Errors are returned as `{"error": {"code", "message"}}` with the status
//! codes listed in [`error`].
//!
//! ## Architecture
//!
//! - [`access`] - Caller resolution and scope decisions
//! - [`error`] - Error types and HTTP mapping
//! - [`config`] - Server configuration
//! - [`state`] - Application state (store, resolver, gate, configuration)
//! - [`middleware`] - The access gate middleware
//! - [`extractors`] - The granted scope extractor
//! - [`model`] - Entities served by the API
//! - [`handlers`] - HTTP request handlers
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod access;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use bastion_persistence::core::IsolationBackend;
use bastion_persistence::isolation::IsolatedStore;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::access::{AuthenticationError, CallerResolver, StaticTokenResolver};

/// Creates the Axum application, resolving callers from the static token
/// table in `config.auth_tokens`.
///
/// Fails if the token table cannot be parsed.
pub fn create_app<B>(
    store: IsolatedStore<B>,
    config: ServerConfig,
) -> Result<Router, AuthenticationError>
where
    B: IsolationBackend + 'static,
{
    let resolver = StaticTokenResolver::parse(&config.auth_tokens)?;
    if resolver.is_empty() {
        info!("No auth tokens configured; every business request will be rejected");
    }
    Ok(create_app_with_resolver(store, Arc::new(resolver), config))
}

/// Creates the Axum application with a custom caller resolver.
///
/// This sets up the routes, the access gate and the tower middleware stack.
pub fn create_app_with_resolver<B>(
    store: IsolatedStore<B>,
    resolver: Arc<dyn CallerResolver>,
    config: ServerConfig,
) -> Router
where
    B: IsolationBackend + 'static,
{
    info!(
        backend = store.backend().name(),
        strict_tenant = config.strict_tenant,
        "Creating REST API server"
    );

    let state = AppState::new(store, resolver, config.clone());
    let router = routing::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    router
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` overrides
/// `level`. Isolation audit events use the `bastion::audit` target.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bastion_rest={level},bastion_persistence={level},bastion::audit=info,tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
