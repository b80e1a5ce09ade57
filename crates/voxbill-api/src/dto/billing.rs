//! Invoice generation DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use voxbill_core::models::{Invoice, InvoiceLine};

/// Invoice generation request for one account and period
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateInvoiceRequest {
    /// Billing period start (inclusive)
    pub period_start: DateTime<Utc>,

    /// Billing period end (inclusive)
    pub period_end: DateTime<Utc>,
}

/// Invoice line response
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLineResponse {
    pub description: String,
    pub quantity_minutes: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl From<InvoiceLine> for InvoiceLineResponse {
    fn from(line: InvoiceLine) -> Self {
        Self {
            description: line.description,
            quantity_minutes: line.quantity_minutes,
            unit_price: line.unit_price,
            total: line.total,
        }
    }
}

/// Invoice response
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: i64,
    pub account_id: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub lines: Vec<InvoiceLineResponse>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            account_id: invoice.account_id,
            period_start: invoice.period_start,
            period_end: invoice.period_end,
            total: invoice.total,
            status: invoice.status.to_string(),
            created_at: invoice.created_at,
            due_date: invoice.due_date,
            lines: invoice.lines.into_iter().map(Into::into).collect(),
        }
    }
}
