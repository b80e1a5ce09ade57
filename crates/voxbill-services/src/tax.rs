//! Tax calculator service
//!
//! Jurisdiction-aware tax computation for top-ups. Pure and
//! deterministic: the same inputs always produce the same breakdown,
//! keeping invoice totals reproducible.
//!
//! The home trade bloc is the EU. The published-rate table below covers
//! a subset of member states; an unlisted member falls back to 0%
//! rather than guessing, which is logged as a gap against the rates'
//! source of truth.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::{debug, warn};
use voxbill_core::models::{TaxBreakdown, TaxType};

/// EU member states (ISO 3166-1 alpha-2)
const EU_MEMBERS: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// Standard consumption-tax rates by member state, as fractions
const VAT_RATES: &[(&str, Decimal)] = &[
    ("AT", dec!(0.20)),
    ("BE", dec!(0.21)),
    ("DE", dec!(0.19)),
    ("DK", dec!(0.25)),
    ("ES", dec!(0.21)),
    ("FI", dec!(0.24)),
    ("FR", dec!(0.20)),
    ("IE", dec!(0.23)),
    ("IT", dec!(0.22)),
    ("NL", dec!(0.21)),
    ("PL", dec!(0.23)),
    ("PT", dec!(0.23)),
    ("SE", dec!(0.25)),
];

/// Tax calculator
///
/// Stateless; construct freely wherever a breakdown is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxCalculator;

impl TaxCalculator {
    /// Create a new tax calculator
    pub fn new() -> Self {
        Self
    }

    /// Whether a jurisdiction belongs to the home trade bloc
    pub fn is_home_bloc(jurisdiction: &str) -> bool {
        EU_MEMBERS.contains(&jurisdiction)
    }

    /// Published rate for a home-bloc jurisdiction, if listed
    fn published_rate(jurisdiction: &str) -> Option<Decimal> {
        VAT_RATES
            .iter()
            .find(|(code, _)| *code == jurisdiction)
            .map(|(_, rate)| *rate)
    }

    /// Compute the tax breakdown for an amount
    ///
    /// Rules, evaluated in order:
    /// 1. No jurisdiction -> 0%, No Tax
    /// 2. Outside the home bloc -> 0%, Export
    /// 3. Home bloc with a registered tax id -> 0%, Reverse Charge
    /// 4. Home bloc consumer -> the jurisdiction's published rate
    pub fn calculate(
        &self,
        jurisdiction: Option<&str>,
        has_tax_registration: bool,
        amount: Decimal,
    ) -> TaxBreakdown {
        let code = match jurisdiction {
            Some(c) if !c.trim().is_empty() => c.trim().to_uppercase(),
            _ => {
                debug!("No jurisdiction supplied, no tax applied");
                return TaxBreakdown::zero(amount, TaxType::NoTax);
            }
        };

        if !Self::is_home_bloc(&code) {
            debug!("Jurisdiction {} outside home bloc, export", code);
            return TaxBreakdown::zero(amount, TaxType::Export);
        }

        if has_tax_registration {
            debug!("Registered business in {}, reverse charge", code);
            return TaxBreakdown::zero(amount, TaxType::ReverseCharge);
        }

        let rate = match Self::published_rate(&code) {
            Some(rate) => rate,
            None => {
                warn!(
                    "No published rate for home-bloc member {}, defaulting to 0%",
                    code
                );
                return TaxBreakdown::zero(amount, TaxType::Standard);
            }
        };

        let tax_amount =
            (amount * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        TaxBreakdown {
            rate,
            tax_amount,
            total_amount: amount + tax_amount,
            tax_type: TaxType::Standard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_jurisdiction_is_no_tax() {
        let calc = TaxCalculator::new();

        let breakdown = calc.calculate(None, false, dec!(100.00));
        assert_eq!(breakdown.tax_type, TaxType::NoTax);
        assert_eq!(breakdown.tax_amount, Decimal::ZERO);
        assert_eq!(breakdown.total_amount, dec!(100.00));

        let blank = calc.calculate(Some("  "), false, dec!(100.00));
        assert_eq!(blank.tax_type, TaxType::NoTax);
    }

    #[test]
    fn test_non_bloc_is_export() {
        let calc = TaxCalculator::new();

        for code in ["US", "GB", "CH", "PE"] {
            let breakdown = calc.calculate(Some(code), false, dec!(100.00));
            assert_eq!(breakdown.tax_type, TaxType::Export, "code {}", code);
            assert_eq!(breakdown.tax_amount, Decimal::ZERO);
        }
    }

    #[test]
    fn test_registered_business_is_reverse_charge() {
        let calc = TaxCalculator::new();

        for code in ["DE", "FR", "BG"] {
            let breakdown = calc.calculate(Some(code), true, dec!(100.00));
            assert_eq!(breakdown.tax_type, TaxType::ReverseCharge, "code {}", code);
            assert_eq!(breakdown.tax_amount, Decimal::ZERO);
            assert_eq!(breakdown.total_amount, dec!(100.00));
        }
    }

    #[test]
    fn test_consumer_pays_published_rate() {
        let calc = TaxCalculator::new();

        let breakdown = calc.calculate(Some("DE"), false, dec!(100.00));
        assert_eq!(breakdown.tax_type, TaxType::Standard);
        assert_eq!(breakdown.rate, dec!(0.19));
        assert_eq!(breakdown.tax_amount, dec!(19.00));
        assert_eq!(breakdown.total_amount, dec!(119.00));
    }

    #[test]
    fn test_unlisted_member_defaults_to_zero() {
        // Bulgaria is a member but carries no published rate here
        let calc = TaxCalculator::new();

        let breakdown = calc.calculate(Some("BG"), false, dec!(100.00));
        assert_eq!(breakdown.tax_type, TaxType::Standard);
        assert_eq!(breakdown.rate, Decimal::ZERO);
        assert_eq!(breakdown.tax_amount, Decimal::ZERO);
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        let calc = TaxCalculator::new();

        // 0.25 * 0.19 = 0.0475 -> 0.05
        let breakdown = calc.calculate(Some("DE"), false, dec!(0.25));
        assert_eq!(breakdown.tax_amount, dec!(0.05));
        assert_eq!(breakdown.total_amount, dec!(0.30));
    }

    #[test]
    fn test_jurisdiction_case_insensitive() {
        let calc = TaxCalculator::new();

        let breakdown = calc.calculate(Some("de"), false, dec!(10.00));
        assert_eq!(breakdown.rate, dec!(0.19));
    }

    #[test]
    fn test_deterministic() {
        let calc = TaxCalculator::new();

        let a = calc.calculate(Some("FR"), false, dec!(42.42));
        let b = calc.calculate(Some("FR"), false, dec!(42.42));
        assert_eq!(a, b);
    }
}
