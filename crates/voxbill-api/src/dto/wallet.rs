//! Wallet and payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use voxbill_core::models::{Payment, Wallet};

/// Top-up request, triggered by a confirmed gateway payment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TopupRequest {
    /// Base amount to credit (tax is charged on top, not banked)
    pub amount: Decimal,

    /// Payment method: card, bank_transfer, gateway, manual
    #[serde(default = "default_method")]
    pub method: String,

    /// External gateway transaction reference
    pub external_ref: Option<String>,
}

fn default_method() -> String {
    "gateway".to_string()
}

/// Usage deduction request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeductRequest {
    /// Amount to deduct
    pub amount: Decimal,

    /// Ledger description
    #[validate(length(min = 1, max = 200, message = "Description is required"))]
    pub description: String,
}

/// Deduction outcome
#[derive(Debug, Clone, Serialize)]
pub struct DeductResponse {
    /// False means insufficient balance; nothing was deducted
    pub deducted: bool,
    /// Balance after the operation
    pub balance: Decimal,
}

/// Wallet response
#[derive(Debug, Clone, Serialize)]
pub struct WalletResponse {
    pub account_id: i32,
    pub balance: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            account_id: wallet.account_id,
            balance: wallet.balance,
            currency: wallet.currency,
            updated_at: wallet.updated_at,
        }
    }
}

/// Payment response
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: i64,
    pub account_id: i32,
    pub base_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub tax_type: String,
    pub method: String,
    pub invoice_number: String,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            account_id: payment.account_id,
            base_amount: payment.base_amount,
            tax_amount: payment.tax_amount,
            total_amount: payment.total_amount,
            tax_type: payment.tax_type,
            method: payment.method.to_string(),
            invoice_number: payment.invoice_number,
            external_ref: payment.external_ref,
            created_at: payment.created_at,
        }
    }
}
