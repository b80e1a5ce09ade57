//! Cost catalog model
//!
//! Wholesale cost entries keyed by destination prefix. Lookup uses
//! longest prefix matching against the dialed number's digits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PricingPlan;

/// Cost catalog entry
///
/// A wholesale unit identified by a numeric destination code and a
/// human-readable name. Entries that have been billed against are
/// treated as immutable; edits apply prospectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    /// Unique identifier
    pub id: i32,

    /// Destination-matching code (numeric prefix, e.g. "44" for the UK)
    pub code: String,

    /// Human-readable destination name
    pub name: String,

    /// Wholesale price per minute
    pub buy_price: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl CostEntry {
    /// Normalize a dialed number for prefix matching
    pub fn normalize_destination(destination: &str) -> String {
        destination.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    /// Generate all possible prefixes for a destination, longest first
    pub fn generate_prefixes(destination: &str) -> Vec<String> {
        let normalized = Self::normalize_destination(destination);
        (1..=normalized.len())
            .rev()
            .map(|i| normalized[..i].to_string())
            .collect()
    }

    /// Check whether this entry's code is a prefix of the given digits
    #[inline]
    pub fn matches(&self, digits: &str) -> bool {
        digits.starts_with(&self.code)
    }
}

impl Default for CostEntry {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            code: String::new(),
            name: String::new(),
            buy_price: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A cost entry joined with the sell-side figures of a pricing plan
#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredRate {
    /// Destination code
    pub code: String,

    /// Destination name
    pub name: String,

    /// Wholesale price per minute
    pub buy_price: Decimal,

    /// Sell price per minute under the plan
    pub sell_price: Decimal,

    /// Profit per minute
    pub profit: Decimal,

    /// Profit margin as a percentage of the buy price
    pub margin_percent: Decimal,
}

impl ConfiguredRate {
    /// Join a cost entry with a plan's computed sell-side figures
    pub fn from_entry(entry: &CostEntry, plan: &PricingPlan) -> Self {
        Self {
            code: entry.code.clone(),
            name: entry.name.clone(),
            buy_price: entry.buy_price,
            sell_price: plan.sell_price(entry.buy_price),
            profit: plan.profit(entry.buy_price),
            margin_percent: plan.margin_percent(entry.buy_price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_destination() {
        assert_eq!(CostEntry::normalize_destination("+44-20-7946"), "44207946");
        assert_eq!(CostEntry::normalize_destination("(555) 123"), "555123");
    }

    #[test]
    fn test_generate_prefixes() {
        let prefixes = CostEntry::generate_prefixes("4420");
        assert_eq!(prefixes, vec!["4420", "442", "44", "4"]);
    }

    #[test]
    fn test_matches() {
        let entry = CostEntry {
            code: "44".to_string(),
            ..Default::default()
        };
        assert!(entry.matches("442079460000"));
        assert!(!entry.matches("34911234567"));
    }

    #[test]
    fn test_configured_rate_from_entry() {
        let entry = CostEntry {
            code: "44".to_string(),
            name: "United Kingdom".to_string(),
            buy_price: dec!(0.01),
            ..Default::default()
        };
        let plan = PricingPlan {
            plan_type: PlanType::Percentage,
            percent_markup: dec!(20),
            rounding_decimals: 5,
            ..Default::default()
        };

        let rate = ConfiguredRate::from_entry(&entry, &plan);
        assert_eq!(rate.sell_price, dec!(0.012));
        assert_eq!(rate.profit, dec!(0.002));
        assert_eq!(rate.margin_percent, dec!(20));
    }
}
