//! Cost catalog and configured-rate DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use voxbill_core::models::{ConfiguredRate, CostEntry};

/// Cost entry creation/update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CostEntryRequest {
    /// Destination-matching code (digits only)
    #[validate(length(min = 1, max = 15, message = "Destination code is required"))]
    pub code: String,

    /// Destination name
    #[validate(length(min = 1, max = 100, message = "Destination name is required"))]
    pub name: String,

    /// Wholesale price per minute
    pub buy_price: Decimal,
}

impl CostEntryRequest {
    /// Additional checks the derive macro cannot express
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if !self.code.chars().all(|c| c.is_ascii_digit()) {
            return Err("Destination code must contain digits only".to_string());
        }
        if self.buy_price < Decimal::ZERO {
            return Err("Buy price cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Cost entry response
#[derive(Debug, Clone, Serialize)]
pub struct CostEntryResponse {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub buy_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CostEntry> for CostEntryResponse {
    fn from(entry: CostEntry) -> Self {
        Self {
            id: entry.id,
            code: entry.code,
            name: entry.name,
            buy_price: entry.buy_price,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// A catalog entry with computed sell-side figures
#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredRateResponse {
    pub code: String,
    pub name: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
}

impl From<ConfiguredRate> for ConfiguredRateResponse {
    fn from(rate: ConfiguredRate) -> Self {
        Self {
            code: rate.code,
            name: rate.name,
            buy_price: rate.buy_price,
            sell_price: rate.sell_price,
            profit: rate.profit,
            margin_percent: rate.margin_percent,
        }
    }
}

/// Destination lookup query
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateLookupParams {
    /// Dialed number to resolve
    #[validate(length(min = 1, message = "Destination is required"))]
    pub destination: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_code_must_be_digits() {
        let req = CostEntryRequest {
            code: "44a".to_string(),
            name: "United Kingdom".to_string(),
            buy_price: dec!(0.01),
        };
        assert!(req.validate_business_rules().is_err());
    }

    #[test]
    fn test_negative_buy_price_rejected() {
        let req = CostEntryRequest {
            code: "44".to_string(),
            name: "United Kingdom".to_string(),
            buy_price: dec!(-0.01),
        };
        assert!(req.validate_business_rules().is_err());
    }
}
