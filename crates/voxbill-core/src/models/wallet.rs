//! Wallet and payment models
//!
//! The wallet is the single authoritative copy of an account's pre-paid
//! balance. Payments are immutable records of top-up events; usage
//! deductions are ledger-only and create no payment record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet entity (one per account, lazily created at zero)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique identifier
    pub id: i32,

    /// Owning account
    pub account_id: i32,

    /// Current spendable balance
    pub balance: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Check whether the wallet can cover an amount
    #[inline]
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

impl Default for Wallet {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            account_id: 0,
            balance: Decimal::ZERO,
            currency: "USD".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment via the gateway
    #[default]
    Card,
    /// Bank transfer reconciled manually
    BankTransfer,
    /// Generic gateway confirmation
    Gateway,
    /// Operator-entered adjustment
    Manual,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Gateway => write!(f, "gateway"),
            PaymentMethod::Manual => write!(f, "manual"),
        }
    }
}

impl PaymentMethod {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "gateway" => Some(PaymentMethod::Gateway),
            "manual" => Some(PaymentMethod::Manual),
            _ => None,
        }
    }
}

/// Payment entity
///
/// Records a confirmed top-up. The wallet is credited with the base
/// amount only: tax is remitted, not banked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: i64,

    /// Owning account
    pub account_id: i32,

    /// Amount credited to the wallet
    pub base_amount: Decimal,

    /// Tax charged on top
    pub tax_amount: Decimal,

    /// Total paid by the customer
    pub total_amount: Decimal,

    /// Tax treatment applied
    pub tax_type: String,

    /// Payment method
    pub method: PaymentMethod,

    /// Sequential invoice number (INV-<year>-<6-digit sequence>)
    pub invoice_number: String,

    /// External gateway transaction reference
    pub external_ref: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            id: 0,
            account_id: 0,
            base_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            tax_type: String::new(),
            method: PaymentMethod::Card,
            invoice_number: String::new(),
            external_ref: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_can_cover() {
        let wallet = Wallet {
            balance: dec!(10.00),
            ..Default::default()
        };
        assert!(wallet.can_cover(dec!(10.00)));
        assert!(!wallet.can_cover(dec!(10.01)));
    }

    #[test]
    fn test_payment_method_round_trip() {
        assert_eq!(
            PaymentMethod::from_str("bank_transfer"),
            Some(PaymentMethod::BankTransfer)
        );
        assert_eq!(PaymentMethod::Gateway.to_string(), "gateway");
    }
}
