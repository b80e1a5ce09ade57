//! Tax breakdown model
//!
//! The result of the jurisdiction-aware tax computation applied to
//! top-ups. The calculation itself lives in the services layer; this
//! type keeps invoice totals reproducible by carrying every derived
//! figure alongside the inputs that produced it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tax treatment applied to an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// No jurisdiction supplied
    NoTax,
    /// Customer outside the home trade bloc
    Export,
    /// Home-bloc business with a registered tax id (B2B exemption)
    ReverseCharge,
    /// Home-bloc consumer, standard rate applies
    Standard,
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxType::NoTax => write!(f, "No Tax"),
            TaxType::Export => write!(f, "Export"),
            TaxType::ReverseCharge => write!(f, "Reverse Charge"),
            TaxType::Standard => write!(f, "Standard"),
        }
    }
}

/// Tax computation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    /// Applied rate as a fraction (0.19 = 19%)
    pub rate: Decimal,

    /// Tax charged, rounded to 2 decimal places
    pub tax_amount: Decimal,

    /// Base amount plus tax
    pub total_amount: Decimal,

    /// Treatment applied
    pub tax_type: TaxType,
}

impl TaxBreakdown {
    /// A zero-tax breakdown for the given base amount
    pub fn zero(amount: Decimal, tax_type: TaxType) -> Self {
        Self {
            rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: amount,
            tax_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_breakdown() {
        let breakdown = TaxBreakdown::zero(dec!(100.00), TaxType::Export);
        assert_eq!(breakdown.tax_amount, Decimal::ZERO);
        assert_eq!(breakdown.total_amount, dec!(100.00));
        assert_eq!(breakdown.tax_type, TaxType::Export);
    }

    #[test]
    fn test_tax_type_display() {
        assert_eq!(TaxType::ReverseCharge.to_string(), "Reverse Charge");
        assert_eq!(TaxType::NoTax.to_string(), "No Tax");
    }
}
