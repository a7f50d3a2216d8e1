//! Tenant-owned entities served by the API.

use bastion_persistence::error::ValidationError;
use bastion_persistence::tenant::{Owned, TenantId};
use bastion_persistence::types::Entity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Awaiting an operator decision.
    #[default]
    Pending,
    /// Approved by an operator.
    Approved,
    /// Rejected by an operator.
    Rejected,
}

impl SubscriptionStatus {
    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Only pending subscriptions can be decided; decisions are final.
    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        matches!(
            (self, next),
            (
                SubscriptionStatus::Pending,
                SubscriptionStatus::Approved | SubscriptionStatus::Rejected
            )
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Pending => write!(f, "pending"),
            SubscriptionStatus::Approved => write!(f, "approved"),
            SubscriptionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A tenant's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Record id; empty until stored.
    #[serde(default)]
    pub id: String,
    /// Owning tenant; assigned on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    /// Plan name.
    pub plan: String,
    /// Number of seats.
    pub seats: u32,
    /// Lifecycle status.
    #[serde(default)]
    pub status: SubscriptionStatus,
}

impl Subscription {
    /// Creates a pending subscription with no owner yet.
    pub fn new(plan: impl Into<String>, seats: u32) -> Self {
        Self {
            id: String::new(),
            tenant_id: None,
            plan: plan.into(),
            seats,
            status: SubscriptionStatus::Pending,
        }
    }

    /// Checks the caller-editable fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.plan.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "plan".to_string(),
            });
        }
        if self.seats == 0 {
            return Err(ValidationError::InvalidField {
                field: "seats".to_string(),
            });
        }
        Ok(())
    }

    /// Moves the subscription to `next`.
    pub fn transition(&mut self, next: SubscriptionStatus) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidRecord {
                collection: Self::COLLECTION.to_string(),
                message: format!("cannot move from {} to {}", self.status, next),
            });
        }
        self.status = next;
        Ok(())
    }
}

impl Owned for Subscription {
    fn owner(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn set_owner(&mut self, owner: TenantId) {
        self.tenant_id = Some(owner);
    }
}

impl Entity for Subscription {
    const COLLECTION: &'static str = "subscriptions";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
