//! Application state for the Bastion REST API.
//!
//! This module defines the shared application state that is available to all
//! request handlers and to the access gate.

use std::sync::Arc;

use bastion_persistence::core::IsolationBackend;
use bastion_persistence::isolation::IsolatedStore;

use crate::access::{AccessGate, CallerResolver};
use crate::config::ServerConfig;

/// Shared application state for the REST API.
///
/// # Type Parameters
///
/// * `B` - The isolation backend (must implement [`IsolationBackend`])
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bastion_persistence::backends::memory::MemoryBackend;
/// use bastion_persistence::isolation::IsolatedStore;
/// use bastion_rest::access::StaticTokenResolver;
/// use bastion_rest::{AppState, ServerConfig};
///
/// let state = AppState::new(
///     IsolatedStore::new(MemoryBackend::new()),
///     Arc::new(StaticTokenResolver::new()),
///     ServerConfig::default(),
/// );
/// assert!(state.gate().is_strict());
/// ```
pub struct AppState<B> {
    /// The tenant-scoped store.
    store: IsolatedStore<B>,

    /// Resolves callers from request credentials.
    resolver: Arc<dyn CallerResolver>,

    /// Grants scopes to resolved callers.
    gate: AccessGate,

    /// Server configuration.
    config: Arc<ServerConfig>,
}

// Manually implement Clone since B is wrapped in Arc and doesn't need to be Clone
impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resolver: Arc::clone(&self.resolver),
            gate: self.gate,
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: IsolationBackend> AppState<B> {
    /// Creates a new AppState. The gate's strictness comes from
    /// `config.strict_tenant`.
    pub fn new(
        store: IsolatedStore<B>,
        resolver: Arc<dyn CallerResolver>,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            gate: AccessGate::new(config.strict_tenant),
            config: Arc::new(config),
        }
    }

    /// Returns the tenant-scoped store.
    pub fn store(&self) -> &IsolatedStore<B> {
        &self.store
    }

    /// Returns the caller resolver.
    pub fn resolver(&self) -> &dyn CallerResolver {
        self.resolver.as_ref()
    }

    /// Returns the access gate.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.store.backend().name()
    }
}
