//! Account DTOs
//!
//! Request and response types for tenant-tree account endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use voxbill_core::models::Account;

/// Account creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AccountCreateRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Account name is required"))]
    pub name: String,

    /// Role: user, company, or reseller
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,

    /// Parent account in the tenant tree
    pub parent_id: Option<i32>,

    /// Billing type: prepaid or postpaid
    #[serde(default = "default_billing_type")]
    pub billing_type: String,

    /// Maximum concurrent calls
    #[serde(default = "default_max_concurrent_calls")]
    #[validate(range(min = 0, max = 10000))]
    pub max_concurrent_calls: i32,

    /// Monthly rate per channel
    #[serde(default)]
    pub per_channel_rate: Decimal,

    /// Assigned pricing plan
    pub plan_id: Option<i32>,

    /// Billing jurisdiction (ISO 3166-1 alpha-2)
    pub country_code: Option<String>,

    /// Registered tax identifier
    pub tax_id: Option<String>,
}

fn default_billing_type() -> String {
    "prepaid".to_string()
}

fn default_max_concurrent_calls() -> i32 {
    5
}

/// Account update request
///
/// A present `parent_id` is a reparent and goes through the hierarchy
/// cycle gate before anything is written.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AccountUpdateRequest {
    /// Display name
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    /// New parent account
    pub parent_id: Option<i32>,

    /// Maximum concurrent calls
    #[validate(range(min = 0, max = 10000))]
    pub max_concurrent_calls: Option<i32>,

    /// Billing type
    pub billing_type: Option<String>,

    /// Monthly rate per channel
    pub per_channel_rate: Option<Decimal>,

    /// Assigned pricing plan
    pub plan_id: Option<i32>,

    /// Billing jurisdiction
    pub country_code: Option<String>,

    /// Registered tax identifier
    pub tax_id: Option<String>,
}

/// Account response
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: i32,
    pub name: String,
    pub role: String,
    pub parent_id: Option<i32>,
    pub reseller_id: Option<i32>,
    pub max_concurrent_calls: i32,
    pub active_calls: i32,
    pub billing_type: String,
    pub per_channel_rate: Decimal,
    pub plan_id: Option<i32>,
    pub country_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            role: account.role.to_string(),
            parent_id: account.parent_id,
            reseller_id: account.reseller_id,
            max_concurrent_calls: account.max_concurrent_calls,
            active_calls: account.active_calls,
            billing_type: account.billing_type.to_string(),
            per_channel_rate: account.per_channel_rate,
            plan_id: account.plan_id,
            country_code: account.country_code,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_name() {
        let req = AccountCreateRequest {
            name: "".to_string(),
            role: "user".to_string(),
            parent_id: None,
            billing_type: default_billing_type(),
            max_concurrent_calls: 5,
            per_channel_rate: Decimal::ZERO,
            plan_id: None,
            country_code: None,
            tax_id: None,
        };
        assert!(req.validate().is_err());
    }
}
