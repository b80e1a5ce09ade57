//! Read-side aggregate models
//!
//! Rollups over descendant sets and per-account channel information.
//! These are pure query results with no side effects; empty sets yield
//! explicit zeros rather than errors.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AccountRole;

/// Aggregate statistics for a reseller's subtree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResellerStats {
    /// Reseller account id
    pub reseller_id: i32,

    /// Companies in the subtree
    pub company_count: i64,

    /// Users in the subtree
    pub user_count: i64,

    /// Sum of configured channel maxima across the subtree
    pub total_channels: i64,

    /// Sum of active calls across the subtree
    pub active_channels: i64,

    /// Calls made today by subtree accounts
    pub calls_today: i64,

    /// Minutes used today
    pub minutes_today: Decimal,

    /// Cost accrued today
    pub cost_today: Decimal,

    /// Sum of wallet balances across the subtree
    pub balance_total: Decimal,
}

/// Aggregate statistics for a company and its users
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyStats {
    /// Company account id
    pub company_id: i32,

    /// Users belonging to the company
    pub user_count: i64,

    /// Company pool channel maximum
    pub max_channels: i32,

    /// Active calls on the company pool
    pub active_channels: i32,

    /// Calls made today by the company's users
    pub calls_today: i64,

    /// Minutes used today
    pub minutes_today: Decimal,

    /// Cost accrued today
    pub cost_today: Decimal,

    /// Sum of wallet balances (company and users)
    pub balance_total: Decimal,
}

/// Channel information for a requesting account
///
/// Reports against the capacity-holding entity: a company user sees its
/// company's shared pool, everyone else sees their own counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Capacity-holding entity id
    pub holder_id: i32,

    /// Capacity-holding entity role
    pub holder_role: AccountRole,

    /// Configured channel maximum
    pub max_channels: i32,

    /// Currently active calls
    pub active_channels: i32,

    /// Channels still available
    pub available_channels: i32,

    /// Utilization percentage (0 when max is 0)
    pub utilization_percent: Decimal,

    /// True when the requester is a user drawing from its company's pool
    pub pooled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_are_zeroed() {
        let stats = ResellerStats::default();
        assert_eq!(stats.company_count, 0);
        assert_eq!(stats.minutes_today, Decimal::ZERO);
        assert_eq!(stats.balance_total, Decimal::ZERO);
    }
}
