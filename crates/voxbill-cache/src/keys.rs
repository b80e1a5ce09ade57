//! Cache key constants and builders for VoxBill
//!
//! Provides standardized key naming patterns for all cached entities,
//! ensuring consistency across the application and preventing key collisions.
//!
//! # Key Patterns
//!
//! - `cost:{destination}` - Cached cost entries by normalized destination
//! - `stats:reseller:{id}` - Cached reseller subtree rollups
//! - `stats:company:{id}` - Cached company rollups
//!
//! # Example
//!
//! ```
//! use voxbill_cache::keys;
//!
//! let key = keys::cost_key("4420");
//! assert_eq!(key, "cost:4420");
//! ```

/// Prefix for cached cost entries
///
/// Format: `cost:{destination}`
pub const COST_KEY_PREFIX: &str = "cost";

/// Prefix for reseller statistics
///
/// Format: `stats:reseller:{id}`
pub const RESELLER_STATS_PREFIX: &str = "stats:reseller";

/// Prefix for company statistics
///
/// Format: `stats:company:{id}`
pub const COMPANY_STATS_PREFIX: &str = "stats:company";

/// Default TTL for cost entries (5 minutes)
pub const COST_TTL_SECS: u64 = 300;

/// Default TTL for statistics rollups (1 minute)
pub const STATS_TTL_SECS: u64 = 60;

/// Build a cost entry cache key
pub fn cost_key(destination: &str) -> String {
    format!("{}:{}", COST_KEY_PREFIX, destination)
}

/// Build a reseller stats cache key
pub fn reseller_stats_key(reseller_id: i32) -> String {
    format!("{}:{}", RESELLER_STATS_PREFIX, reseller_id)
}

/// Build a company stats cache key
pub fn company_stats_key(company_id: i32) -> String {
    format!("{}:{}", COMPANY_STATS_PREFIX, company_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(cost_key("4420"), "cost:4420");
        assert_eq!(reseller_stats_key(7), "stats:reseller:7");
        assert_eq!(company_stats_key(12), "stats:company:12");
    }
}
