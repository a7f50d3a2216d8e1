//! Tenant identifier type.
//!
//! This module defines [`TenantId`], the positive integer that names the
//! organization owning a record.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// A positive tenant identifier.
///
/// Tenant ids are always strictly positive. Zero and negative values are
/// rejected at construction, so a `TenantId` in hand is always usable as a
/// row owner.
///
/// # Examples
///
/// ```
/// use bastion_persistence::tenant::TenantId;
///
/// let tenant = TenantId::new(42).unwrap();
/// assert_eq!(tenant.get(), 42);
/// assert!(TenantId::new(0).is_err());
/// assert!(TenantId::new(-7).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(NonZeroU64);

impl TenantId {
    /// Creates a tenant id, failing with [`TenantError::InvalidScope`] unless
    /// `id` is strictly positive.
    pub fn new(id: i64) -> Result<Self, TenantError> {
        u64::try_from(id)
            .ok()
            .and_then(NonZeroU64::new)
            .map(Self)
            .ok_or_else(|| TenantError::InvalidScope {
                value: id.to_string(),
            })
    }

    /// Returns the numeric value.
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    /// Returns the value as a signed integer, the way SQL columns hold it.
    ///
    /// Every `TenantId` is built from a positive `i64`, so this never wraps.
    pub fn as_i64(&self) -> i64 {
        self.0.get() as i64
    }
}

impl TryFrom<i64> for TenantId {
    type Error = TenantError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.as_i64()
    }
}

impl FromStr for TenantId {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| TenantError::InvalidScope {
                value: trimmed.to_string(),
            })?;
        Self::new(value)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_new() {
        let tenant = TenantId::new(7).unwrap();
        assert_eq!(tenant.get(), 7);
        assert_eq!(tenant.as_i64(), 7);
    }

    #[test]
    fn test_tenant_id_rejects_non_positive() {
        assert!(matches!(
            TenantId::new(0),
            Err(TenantError::InvalidScope { value }) if value == "0"
        ));
        assert!(TenantId::new(-1).is_err());
        assert!(TenantId::new(i64::MIN).is_err());
    }

    #[test]
    fn test_tenant_id_max() {
        let tenant = TenantId::new(i64::MAX).unwrap();
        assert_eq!(tenant.as_i64(), i64::MAX);
    }

    #[test]
    fn test_tenant_id_from_str() {
        assert_eq!("12".parse::<TenantId>().unwrap().get(), 12);
        assert_eq!(" 3 ".parse::<TenantId>().unwrap().get(), 3);
        assert!("abc".parse::<TenantId>().is_err());
        assert!("-4".parse::<TenantId>().is_err());
        assert!("".parse::<TenantId>().is_err());
    }

    #[test]
    fn test_tenant_id_display_and_debug() {
        let tenant = TenantId::new(99).unwrap();
        assert_eq!(tenant.to_string(), "99");
        assert_eq!(format!("{:?}", tenant), "TenantId(99)");
    }

    #[test]
    fn test_tenant_id_serde() {
        let tenant = TenantId::new(5).unwrap();
        let json = serde_json::to_string(&tenant).unwrap();
        assert_eq!(json, "5");

        let parsed: TenantId = serde_json::from_str("5").unwrap();
        assert_eq!(parsed, tenant);

        assert!(serde_json::from_str::<TenantId>("0").is_err());
        assert!(serde_json::from_str::<TenantId>("-2").is_err());
    }

    #[test]
    fn test_tenant_id_ordering() {
        let a = TenantId::new(1).unwrap();
        let b = TenantId::new(2).unwrap();
        assert!(a < b);
    }
}
