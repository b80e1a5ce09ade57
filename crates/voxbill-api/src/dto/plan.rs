//! Pricing plan DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use voxbill_core::models::{PlanType, PricingPlan};

/// Plan creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlanCreateRequest {
    /// Plan name (unique)
    #[validate(length(min = 1, max = 100, message = "Plan name is required"))]
    pub name: String,

    /// Markup rule: percentage, fixed, or free
    #[validate(length(min = 1, message = "Plan type is required"))]
    pub plan_type: String,

    /// Percentage markup
    #[serde(default)]
    pub percent_markup: Decimal,

    /// Fixed markup amount
    #[serde(default)]
    pub fixed_markup: Decimal,

    /// Lower markup bound
    #[serde(default)]
    pub min_markup: Decimal,

    /// Upper markup bound
    #[serde(default = "default_max_markup")]
    pub max_markup: Decimal,

    /// Sell price precision in decimal places
    #[serde(default = "default_rounding_decimals")]
    #[validate(range(min = 0, max = 10))]
    pub rounding_decimals: u32,

    /// Billing increment in seconds
    #[serde(default = "default_billing_increment")]
    #[validate(range(min = 1, max = 3600))]
    pub billing_increment: i32,
}

fn default_max_markup() -> Decimal {
    Decimal::from(999_999)
}

fn default_rounding_decimals() -> u32 {
    5
}

fn default_billing_increment() -> i32 {
    60
}

impl PlanCreateRequest {
    /// Build the plan entity; custom plans are never predefined and
    /// start active (enforced again by the rate engine).
    pub fn into_plan(self) -> Result<PricingPlan, String> {
        let plan_type =
            PlanType::from_str(&self.plan_type).ok_or_else(|| "Invalid plan type".to_string())?;

        Ok(PricingPlan {
            name: self.name,
            plan_type,
            percent_markup: self.percent_markup,
            fixed_markup: self.fixed_markup,
            min_markup: self.min_markup,
            max_markup: self.max_markup,
            rounding_decimals: self.rounding_decimals,
            billing_increment: self.billing_increment,
            is_predefined: false,
            is_active: true,
            ..Default::default()
        })
    }
}

/// Plan response
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub id: i32,
    pub name: String,
    pub plan_type: String,
    pub percent_markup: Decimal,
    pub fixed_markup: Decimal,
    pub min_markup: Decimal,
    pub max_markup: Decimal,
    pub rounding_decimals: u32,
    pub billing_increment: i32,
    pub is_predefined: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PricingPlan> for PlanResponse {
    fn from(plan: PricingPlan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            plan_type: plan.plan_type.to_string(),
            percent_markup: plan.percent_markup,
            fixed_markup: plan.fixed_markup,
            min_markup: plan.min_markup,
            max_markup: plan.max_markup,
            rounding_decimals: plan.rounding_decimals,
            billing_increment: plan.billing_increment,
            is_predefined: plan.is_predefined,
            is_active: plan.is_active,
            created_at: plan.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_into_plan_rejects_bad_type() {
        let req = PlanCreateRequest {
            name: "Retail".to_string(),
            plan_type: "flat".to_string(),
            percent_markup: dec!(10),
            fixed_markup: Decimal::ZERO,
            min_markup: Decimal::ZERO,
            max_markup: default_max_markup(),
            rounding_decimals: 5,
            billing_increment: 60,
        };
        assert!(req.into_plan().is_err());
    }

    #[test]
    fn test_into_plan_forces_custom_flags() {
        let req = PlanCreateRequest {
            name: "Retail".to_string(),
            plan_type: "percentage".to_string(),
            percent_markup: dec!(10),
            fixed_markup: Decimal::ZERO,
            min_markup: Decimal::ZERO,
            max_markup: default_max_markup(),
            rounding_decimals: 5,
            billing_increment: 60,
        };
        let plan = req.into_plan().unwrap();
        assert!(!plan.is_predefined);
        assert!(plan.is_active);
    }
}
