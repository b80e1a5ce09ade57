//! Invoice models
//!
//! Invoices are generated artifacts of the billing batch job. An invoice
//! owns its line items; once created, only the status may change, driven
//! by payment confirmation from the external gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Awaiting payment
    #[default]
    Unpaid,
    /// Payment confirmed
    Paid,
    /// Voided before payment
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Unpaid => write!(f, "unpaid"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl InvoiceStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unpaid" => Some(InvoiceStatus::Unpaid),
            "paid" => Some(InvoiceStatus::Paid),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }
}

/// Invoice entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: i64,

    /// Owning account
    pub account_id: i32,

    /// Billing period start (inclusive)
    pub period_start: DateTime<Utc>,

    /// Billing period end (inclusive)
    pub period_end: DateTime<Utc>,

    /// Sum of line totals
    pub total: Decimal,

    /// Payment status
    pub status: InvoiceStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Due date (creation + configured due days)
    pub due_date: DateTime<Utc>,

    /// Owned line items, ordered by description
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    /// Whether the invoice is past due and still unpaid
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Unpaid && now > self.due_date
    }
}

impl Default for Invoice {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            account_id: 0,
            period_start: now,
            period_end: now,
            total: Decimal::ZERO,
            status: InvoiceStatus::Unpaid,
            created_at: now,
            due_date: now,
            lines: Vec::new(),
        }
    }
}

/// Invoice line item
///
/// Exists only as a child of exactly one invoice. The unit price is a
/// derived average (total cost / total minutes), not an authoritative
/// rate: per-call rates that varied within the group are masked by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Unique identifier
    pub id: i64,

    /// Owning invoice
    pub invoice_id: i64,

    /// Resolved destination name
    pub description: String,

    /// Total minutes at 5-decimal precision
    pub quantity_minutes: Decimal,

    /// Derived average price per minute
    pub unit_price: Decimal,

    /// Sum of the actual per-call costs
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_overdue_only_when_unpaid() {
        let now = Utc::now();
        let invoice = Invoice {
            status: InvoiceStatus::Unpaid,
            due_date: now - Duration::days(1),
            ..Default::default()
        };
        assert!(invoice.is_overdue(now));

        let paid = Invoice {
            status: InvoiceStatus::Paid,
            due_date: now - Duration::days(1),
            ..Default::default()
        };
        assert!(!paid.is_overdue(now));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(InvoiceStatus::from_str("PAID"), Some(InvoiceStatus::Paid));
        assert_eq!(InvoiceStatus::Cancelled.to_string(), "cancelled");
    }
}
