//! HTTP request handlers.
//!
//! - [`health`] - Health, liveness and readiness probes (exempt from the gate)
//! - [`subscriptions`] - Tenant-scoped subscription management

pub mod health;
pub mod subscriptions;

// Re-export handlers for convenience
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use subscriptions::{
    approve_subscription_handler, create_subscription_handler, delete_subscription_handler,
    list_subscriptions_handler, read_subscription_handler, reassign_subscription_handler,
    reject_subscription_handler, update_subscription_handler,
};
