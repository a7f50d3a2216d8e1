//! Subscription handlers.
//!
//! Every handler runs its store work inside one scoped session opened with
//! the scope the access gate granted. Tenant callers see and change only
//! their own subscriptions; foreign ones are reported as not found.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /subscriptions` | [`list_subscriptions_handler`] |
//! | `POST /subscriptions` | [`create_subscription_handler`] |
//! | `GET /subscriptions/{id}` | [`read_subscription_handler`] |
//! | `PUT /subscriptions/{id}` | [`update_subscription_handler`] |
//! | `DELETE /subscriptions/{id}` | [`delete_subscription_handler`] |
//! | `POST /subscriptions/{id}/approve` | [`approve_subscription_handler`] |
//! | `POST /subscriptions/{id}/reject` | [`reject_subscription_handler`] |
//! | `PUT /subscriptions/{id}/owner` | [`reassign_subscription_handler`] |

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bastion_persistence::core::IsolationBackend;
use bastion_persistence::error::StorageError;
use bastion_persistence::tenant::{TenantId, TenantScope};
use bastion_persistence::types::{Entity, RecordQuery};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{RestError, RestResult};
use crate::extractors::Scoped;
use crate::model::{Subscription, SubscriptionStatus};
use crate::state::AppState;

/// Query parameters for listing subscriptions.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Only return subscriptions in this status.
    pub status: Option<SubscriptionStatus>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Number of results to skip.
    pub offset: Option<u32>,
}

/// Body of a create request.
#[derive(Debug, Deserialize)]
pub struct CreateSubscription {
    /// Plan name.
    pub plan: String,
    /// Number of seats.
    pub seats: u32,
    /// Owner; required for operators, optional and checked for tenants.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

/// Body of an update request.
#[derive(Debug, Deserialize)]
pub struct UpdateSubscription {
    /// Plan name.
    pub plan: String,
    /// Number of seats.
    pub seats: u32,
    /// Owner carried by the payload; must match the stored owner.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

/// Body of an owner reassignment request.
#[derive(Debug, Deserialize)]
pub struct ReassignOwner {
    /// The new owner.
    pub tenant_id: TenantId,
}

/// Lists the subscriptions visible in the caller's scope.
///
/// `GET /subscriptions?status=pending&limit=20&offset=0`
pub async fn list_subscriptions_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Query(params): Query<ListParams>,
) -> RestResult<Json<Vec<Subscription>>>
where
    B: IsolationBackend + 'static,
{
    debug!(scope = %scoped.scope(), ?params, "Processing list request");

    let mut query = RecordQuery::new(Subscription::COLLECTION);
    if let Some(status) = params.status {
        query = query.where_field("status", serde_json::to_value(status)?);
    }
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }

    let subscriptions = state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| async move {
            session.list::<Subscription>(query).await
        })
        .await?;
    Ok(Json(subscriptions))
}

/// Creates a subscription owned by the caller's tenant.
///
/// `POST /subscriptions`
///
/// - `201 Created` - The stored subscription
/// - `400 Bad Request` - Invalid body, or an operator omitted `tenant_id`
/// - `403 Forbidden` - A tenant caller named another tenant as owner
pub async fn create_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Json(body): Json<CreateSubscription>,
) -> RestResult<Response>
where
    B: IsolationBackend + 'static,
{
    let mut subscription = Subscription::new(body.plan, body.seats);
    subscription.tenant_id = body.tenant_id;
    subscription.validate()?;

    let created = state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| async move {
            session.create(subscription).await
        })
        .await?;

    debug!(id = %created.id, "Subscription created");
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// Reads a subscription.
///
/// `GET /subscriptions/{id}`
pub async fn read_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Path(id): Path<String>,
) -> RestResult<Json<Subscription>>
where
    B: IsolationBackend + 'static,
{
    let found = state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| {
            let id = id.clone();
            async move { session.read::<Subscription>(&id).await }
        })
        .await?;
    found.map(Json).ok_or_else(|| not_found(id))
}

/// Replaces the caller-editable fields of a subscription.
///
/// `PUT /subscriptions/{id}`
///
/// The owner cannot be changed here; a payload naming a different owner is
/// rejected. Use the owner route for administrative moves.
pub async fn update_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Path(id): Path<String>,
    Json(body): Json<UpdateSubscription>,
) -> RestResult<Json<Subscription>>
where
    B: IsolationBackend + 'static,
{
    let updated = state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| async move {
            let mut current = session
                .read::<Subscription>(&id)
                .await?
                .ok_or_else(|| not_found(id))?;
            current.plan = body.plan;
            current.seats = body.seats;
            if body.tenant_id.is_some() {
                current.tenant_id = body.tenant_id;
            }
            current.validate()?;
            Ok::<_, RestError>(session.update(current).await?)
        })
        .await?;
    Ok(Json(updated))
}

/// Deletes a subscription.
///
/// `DELETE /subscriptions/{id}`
pub async fn delete_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Path(id): Path<String>,
) -> RestResult<StatusCode>
where
    B: IsolationBackend + 'static,
{
    state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| async move {
            session.delete::<Subscription>(&id).await
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Approves a pending subscription. Operators only.
///
/// `POST /subscriptions/{id}/approve`
pub async fn approve_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Path(id): Path<String>,
) -> RestResult<Json<Subscription>>
where
    B: IsolationBackend + 'static,
{
    decide(&state, &scoped, id, SubscriptionStatus::Approved)
        .await
        .map(Json)
}

/// Rejects a pending subscription. Operators only.
///
/// `POST /subscriptions/{id}/reject`
pub async fn reject_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Path(id): Path<String>,
) -> RestResult<Json<Subscription>>
where
    B: IsolationBackend + 'static,
{
    decide(&state, &scoped, id, SubscriptionStatus::Rejected)
        .await
        .map(Json)
}

async fn decide<B>(
    state: &AppState<B>,
    scoped: &Scoped,
    id: String,
    decision: SubscriptionStatus,
) -> RestResult<Subscription>
where
    B: IsolationBackend + 'static,
{
    let actor = scoped.identity().subject.clone();
    state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| async move {
            // The decision is gated on the bound scope, not on the route.
            if session.current() != Some(TenantScope::Privileged) {
                return Err(RestError::forbidden(format!(
                    "{} requires the privileged scope",
                    decision
                )));
            }

            let mut subscription = session
                .read::<Subscription>(&id)
                .await?
                .ok_or_else(|| not_found(id))?;
            subscription.transition(decision)?;
            let subscription = session.update(subscription).await?;

            info!(
                id = %subscription.id,
                tenant_id = ?subscription.tenant_id,
                status = %subscription.status,
                actor = ?actor,
                "Subscription decided"
            );
            Ok(subscription)
        })
        .await
}

/// Moves a subscription to another tenant. Operators only.
///
/// `PUT /subscriptions/{id}/owner`
pub async fn reassign_subscription_handler<B>(
    State(state): State<AppState<B>>,
    scoped: Scoped,
    Path(id): Path<String>,
    Json(body): Json<ReassignOwner>,
) -> RestResult<Json<Subscription>>
where
    B: IsolationBackend + 'static,
{
    let record = state
        .store()
        .with_scope(&scoped.context(), scoped.scope(), |mut session| async move {
            session
                .reassign_owner(Subscription::COLLECTION, &id, body.tenant_id)
                .await
        })
        .await?;
    let subscription = record
        .to_entity::<Subscription>()
        .map_err(StorageError::from)?;
    Ok(Json(subscription))
}

fn not_found(id: String) -> RestError {
    RestError::NotFound {
        collection: Subscription::COLLECTION.to_string(),
        id,
    }
}
