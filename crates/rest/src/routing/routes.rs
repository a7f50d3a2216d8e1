//! Route configuration.
//!
//! Routes are split by [`OperationCategory`]: exempt routes are mounted on
//! their own router, business routes on a router wrapped in the access gate.
//! The two are merged at the end, so a business route can never be reached
//! without passing the gate.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use bastion_persistence::core::IsolationBackend;

use crate::access::OperationCategory;
use crate::handlers;
use crate::middleware::access_gate;
use crate::state::AppState;

/// Creates all REST API routes.
///
/// # Routes
///
/// ## Health (exempt)
/// - `GET /health` - Health check
/// - `GET /_liveness` - Liveness probe
/// - `GET /_readiness` - Readiness probe
///
/// ## Business (gated)
/// - `GET /subscriptions` - List
/// - `POST /subscriptions` - Create
/// - `GET /subscriptions/{id}` - Read
/// - `PUT /subscriptions/{id}` - Update
/// - `DELETE /subscriptions/{id}` - Delete
/// - `POST /subscriptions/{id}/approve` - Approve (operators)
/// - `POST /subscriptions/{id}/reject` - Reject (operators)
/// - `PUT /subscriptions/{id}/owner` - Reassign owner (operators)
pub fn create_routes<B>(state: AppState<B>) -> Router
where
    B: IsolationBackend + 'static,
{
    exempt_routes::<B>(OperationCategory::Health)
        .merge(business_routes(state.clone()))
        .with_state(state)
}

/// Routes of an exempt category. They never see the gate.
fn exempt_routes<B>(category: OperationCategory) -> Router<AppState<B>>
where
    B: IsolationBackend + 'static,
{
    debug_assert!(category.is_exempt());
    match category {
        OperationCategory::Health => Router::new()
            .route("/health", get(handlers::health_handler::<B>))
            .route("/_liveness", get(handlers::liveness_handler))
            .route("/_readiness", get(handlers::readiness_handler::<B>)),
        // No authentication or onboarding endpoints are served yet.
        _ => Router::new(),
    }
}

/// Business routes, all behind the access gate.
fn business_routes<B>(state: AppState<B>) -> Router<AppState<B>>
where
    B: IsolationBackend + 'static,
{
    Router::new()
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions_handler::<B>)
                .post(handlers::create_subscription_handler::<B>),
        )
        .route(
            "/subscriptions/{id}",
            get(handlers::read_subscription_handler::<B>)
                .put(handlers::update_subscription_handler::<B>)
                .delete(handlers::delete_subscription_handler::<B>),
        )
        .route(
            "/subscriptions/{id}/approve",
            post(handlers::approve_subscription_handler::<B>),
        )
        .route(
            "/subscriptions/{id}/reject",
            post(handlers::reject_subscription_handler::<B>),
        )
        .route(
            "/subscriptions/{id}/owner",
            put(handlers::reassign_subscription_handler::<B>),
        )
        .route_layer(from_fn_with_state(state, access_gate::<B>))
}
