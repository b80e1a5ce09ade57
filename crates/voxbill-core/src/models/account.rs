//! Account model
//!
//! Represents a node in the reseller tenant tree. Accounts form a
//! Reseller -> Company -> User hierarchy via the parent reference.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    /// End user - originates calls, draws capacity from its company pool
    #[default]
    User,
    /// Company - groups users and holds the shared concurrency pool
    Company,
    /// Reseller - root of an ownership subtree
    Reseller,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::User => write!(f, "user"),
            AccountRole::Company => write!(f, "company"),
            AccountRole::Reseller => write!(f, "reseller"),
        }
    }
}

impl AccountRole {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(AccountRole::User),
            "company" => Some(AccountRole::Company),
            "reseller" => Some(AccountRole::Reseller),
            _ => None,
        }
    }
}

/// Billing type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingType {
    /// Prepaid - usage is deducted from the wallet balance
    #[default]
    Prepaid,
    /// Postpaid - usage accumulates and is settled by invoice
    Postpaid,
}

impl fmt::Display for BillingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingType::Prepaid => write!(f, "prepaid"),
            BillingType::Postpaid => write!(f, "postpaid"),
        }
    }
}

impl BillingType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prepaid" => Some(BillingType::Prepaid),
            "postpaid" => Some(BillingType::Postpaid),
            _ => None,
        }
    }
}

/// Account entity
///
/// A node in the tenant tree. The parent chain must be acyclic and
/// terminate at a Reseller (or have no parent); `HierarchyDirectory::can_reparent`
/// is the sole gate enforcing this, so every parent mutation goes through it.
///
/// The account's pre-paid balance lives in its wallet row (one per account),
/// keeping a single authoritative copy for ledger operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: i32,

    /// Display name
    pub name: String,

    /// Role in the tenant tree
    pub role: AccountRole,

    /// Parent account (None for tree roots)
    pub parent_id: Option<i32>,

    /// Denormalized reseller root of this subtree
    pub reseller_id: Option<i32>,

    /// Maximum concurrent calls allowed on this account's pool
    pub max_concurrent_calls: i32,

    /// Currently active calls on this account's pool
    pub active_calls: i32,

    /// Billing type
    pub billing_type: BillingType,

    /// Monthly rate charged per concurrent channel
    pub per_channel_rate: Decimal,

    /// Assigned pricing plan (None = platform default plan)
    pub plan_id: Option<i32>,

    /// Billing jurisdiction (ISO 3166-1 alpha-2)
    pub country_code: Option<String>,

    /// Registered tax identifier, when the customer is a business
    pub tax_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Check whether this account has channel capacity left
    #[inline]
    pub fn has_free_channel(&self) -> bool {
        self.active_calls < self.max_concurrent_calls
    }

    /// Available channels on this account's pool
    #[inline]
    pub fn available_channels(&self) -> i32 {
        (self.max_concurrent_calls - self.active_calls).max(0)
    }

    /// Channel utilization as a percentage (0 when no channels are configured)
    pub fn utilization_percent(&self) -> Decimal {
        if self.max_concurrent_calls <= 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.active_calls) * Decimal::from(100)
            / Decimal::from(self.max_concurrent_calls)
    }

    /// Check if this account is a tree root (no parent)
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether the account carries a registered tax identifier
    pub fn has_tax_registration(&self) -> bool {
        self.tax_id.as_deref().map_or(false, |t| !t.trim().is_empty())
    }
}

impl Default for Account {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            role: AccountRole::User,
            parent_id: None,
            reseller_id: None,
            max_concurrent_calls: 0,
            active_calls: 0,
            billing_type: BillingType::Prepaid,
            per_channel_rate: Decimal::ZERO,
            plan_id: None,
            country_code: None,
            tax_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(AccountRole::from_str("RESELLER"), Some(AccountRole::Reseller));
        assert_eq!(AccountRole::from_str("company"), Some(AccountRole::Company));
        assert_eq!(AccountRole::from_str("nope"), None);
        assert_eq!(AccountRole::Company.to_string(), "company");
    }

    #[test]
    fn test_free_channels() {
        let account = Account {
            max_concurrent_calls: 5,
            active_calls: 3,
            ..Default::default()
        };

        assert!(account.has_free_channel());
        assert_eq!(account.available_channels(), 2);
    }

    #[test]
    fn test_no_free_channel_at_max() {
        let account = Account {
            max_concurrent_calls: 2,
            active_calls: 2,
            ..Default::default()
        };

        assert!(!account.has_free_channel());
        assert_eq!(account.available_channels(), 0);
    }

    #[test]
    fn test_utilization_percent() {
        let account = Account {
            max_concurrent_calls: 4,
            active_calls: 1,
            ..Default::default()
        };
        assert_eq!(account.utilization_percent(), dec!(25));

        // Zero max must not divide by zero
        let account = Account {
            max_concurrent_calls: 0,
            active_calls: 0,
            ..Default::default()
        };
        assert_eq!(account.utilization_percent(), Decimal::ZERO);
    }
}
