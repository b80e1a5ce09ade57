//! Pricing plan model
//!
//! Plans define how a wholesale buy price is marked up into the sell
//! price charged to a tenant. The markup computation is pure and lives
//! here so rating and invoicing share a single implementation.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Markup rule type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    /// Markup is a percentage of the buy price
    #[default]
    Percentage,
    /// Markup is a fixed amount per unit, independent of the buy price
    Fixed,
    /// Everything sells at zero
    Free,
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanType::Percentage => write!(f, "percentage"),
            PlanType::Fixed => write!(f, "fixed"),
            PlanType::Free => write!(f, "free"),
        }
    }
}

impl PlanType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "percentage" => Some(PlanType::Percentage),
            "fixed" => Some(PlanType::Fixed),
            "free" => Some(PlanType::Free),
            _ => None,
        }
    }
}

/// Pricing plan entity
///
/// An account references at most one active plan; accounts without a plan
/// fall back to the platform's predefined 0%-markup plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPlan {
    /// Unique identifier
    pub id: i32,

    /// Plan name (unique across plans)
    pub name: String,

    /// Markup rule type
    pub plan_type: PlanType,

    /// Percentage markup (used by Percentage plans)
    pub percent_markup: Decimal,

    /// Fixed markup amount (used by Fixed plans)
    pub fixed_markup: Decimal,

    /// Lower markup bound
    pub min_markup: Decimal,

    /// Upper markup bound
    pub max_markup: Decimal,

    /// Sell price rounding precision in decimal places
    pub rounding_decimals: u32,

    /// Billing increment in seconds
    pub billing_increment: i32,

    /// Whether this is a system-seeded plan
    pub is_predefined: bool,

    /// Whether the plan is selectable
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PricingPlan {
    /// Compute the raw markup for a buy price, clamped to the plan bounds
    pub fn markup_for(&self, buy_price: Decimal) -> Decimal {
        let markup = match self.plan_type {
            PlanType::Percentage => buy_price * self.percent_markup / Decimal::from(100),
            PlanType::Fixed => self.fixed_markup,
            PlanType::Free => return Decimal::ZERO,
        };

        // Clamp to the plan bounds; validate() keeps min <= max
        markup.max(self.min_markup).min(self.max_markup)
    }

    /// Compute the sell price for a wholesale buy price
    ///
    /// Free plans sell at zero regardless of cost. Otherwise
    /// `sell = buy + clamped markup`, rounded to `rounding_decimals`
    /// using round-half-away-from-zero. The rounding rule matters: at
    /// scale it shifts margin by fractions of a cent, so it is fixed
    /// here and covered by tests.
    pub fn sell_price(&self, buy_price: Decimal) -> Decimal {
        if self.plan_type == PlanType::Free {
            return Decimal::ZERO;
        }

        let sell = buy_price + self.markup_for(buy_price);
        sell.round_dp_with_strategy(self.rounding_decimals, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Profit over a buy price at this plan's sell price
    pub fn profit(&self, buy_price: Decimal) -> Decimal {
        self.sell_price(buy_price) - buy_price
    }

    /// Profit margin as a percentage of the buy price (0 when cost is 0)
    pub fn margin_percent(&self, buy_price: Decimal) -> Decimal {
        if buy_price.is_zero() {
            return Decimal::ZERO;
        }
        self.profit(buy_price) * Decimal::from(100) / buy_price
    }

    /// Validate plan configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Plan name cannot be empty".to_string());
        }

        if self.percent_markup < Decimal::ZERO {
            return Err("Percentage markup cannot be negative".to_string());
        }

        if self.min_markup > self.max_markup {
            return Err("Minimum markup cannot exceed maximum markup".to_string());
        }

        if self.rounding_decimals > 10 {
            return Err("Rounding precision cannot exceed 10 decimal places".to_string());
        }

        if self.billing_increment <= 0 {
            return Err("Billing increment must be greater than zero".to_string());
        }

        Ok(())
    }
}

impl Default for PricingPlan {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            plan_type: PlanType::Percentage,
            percent_markup: Decimal::ZERO,
            fixed_markup: Decimal::ZERO,
            min_markup: Decimal::ZERO,
            max_markup: Decimal::from(999_999),
            rounding_decimals: 5,
            billing_increment: 60,
            is_predefined: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn percentage_plan(percent: Decimal) -> PricingPlan {
        PricingPlan {
            name: "Test".to_string(),
            plan_type: PlanType::Percentage,
            percent_markup: percent,
            ..Default::default()
        }
    }

    #[test]
    fn test_percentage_sell_price() {
        // 20% over 0.01 at 5 decimal places
        let plan = percentage_plan(dec!(20));
        assert_eq!(plan.sell_price(dec!(0.01)), dec!(0.012));
    }

    #[test]
    fn test_fixed_sell_price_ignores_cost() {
        let plan = PricingPlan {
            plan_type: PlanType::Fixed,
            fixed_markup: dec!(0.005),
            ..Default::default()
        };

        assert_eq!(plan.markup_for(dec!(0.01)), dec!(0.005));
        assert_eq!(plan.markup_for(dec!(10.00)), dec!(0.005));
        assert_eq!(plan.sell_price(dec!(0.01)), dec!(0.015));
    }

    #[test]
    fn test_free_plan_always_zero() {
        let plan = PricingPlan {
            plan_type: PlanType::Free,
            percent_markup: dec!(50),
            fixed_markup: dec!(1.00),
            ..Default::default()
        };

        assert_eq!(plan.sell_price(dec!(0.00)), Decimal::ZERO);
        assert_eq!(plan.sell_price(dec!(0.01)), Decimal::ZERO);
        assert_eq!(plan.sell_price(dec!(99.99)), Decimal::ZERO);
    }

    #[test]
    fn test_markup_clamped_to_bounds() {
        let plan = PricingPlan {
            plan_type: PlanType::Percentage,
            percent_markup: dec!(100),
            min_markup: dec!(0.02),
            max_markup: dec!(0.05),
            ..Default::default()
        };

        // 100% of 0.01 = 0.01, below the 0.02 floor
        assert_eq!(plan.markup_for(dec!(0.01)), dec!(0.02));
        // 100% of 1.00 = 1.00, above the 0.05 ceiling
        assert_eq!(plan.markup_for(dec!(1.00)), dec!(0.05));
        // Sell price always within [cost+min, cost+max]
        for cost in [dec!(0.001), dec!(0.04), dec!(2.50)] {
            let sell = plan.sell_price(cost);
            assert!(sell >= cost + plan.min_markup);
            assert!(sell <= cost + plan.max_markup);
        }
    }

    #[test]
    fn test_sell_price_monotonic_in_cost() {
        let plan = percentage_plan(dec!(15));
        let mut last = Decimal::ZERO;
        for cost in [dec!(0.001), dec!(0.01), dec!(0.1), dec!(1), dec!(10)] {
            let sell = plan.sell_price(cost);
            assert!(sell >= last, "sell price decreased at cost {}", cost);
            last = sell;
        }
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let plan = PricingPlan {
            plan_type: PlanType::Percentage,
            percent_markup: dec!(0),
            rounding_decimals: 2,
            ..Default::default()
        };

        // Exactly half a cent rounds up, not to even
        assert_eq!(plan.sell_price(dec!(0.125)), dec!(0.13));
        assert_eq!(plan.sell_price(dec!(0.135)), dec!(0.14));
    }

    #[test]
    fn test_margin_percent_zero_cost() {
        let plan = percentage_plan(dec!(20));
        assert_eq!(plan.margin_percent(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(plan.margin_percent(dec!(0.01)), dec!(20));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let plan = PricingPlan {
            name: "Bad".to_string(),
            min_markup: dec!(5),
            max_markup: dec!(1),
            ..Default::default()
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let plan = PricingPlan {
            name: "  ".to_string(),
            ..Default::default()
        };
        assert!(plan.validate().is_err());
    }
}
