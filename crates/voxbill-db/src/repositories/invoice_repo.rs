//! Invoice repository implementation
//!
//! Read side and status transitions only. Invoice creation happens in
//! the invoice generator's transaction, which also marks the claimed
//! call records billed so the two cannot diverge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use voxbill_core::{
    models::{Invoice, InvoiceLine, InvoiceStatus},
    traits::InvoiceRepository,
    AppError, AppResult,
};

/// PostgreSQL implementation of InvoiceRepository
pub struct PgInvoiceRepository {
    pool: PgPool,
}

const INVOICE_COLUMNS: &str = r#"
    id, account_id, period_start, period_end,
    total, status, created_at, due_date
"#;

impl PgInvoiceRepository {
    /// Create a new invoice repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert database status string to enum
    fn parse_status(s: &str) -> InvoiceStatus {
        InvoiceStatus::from_str(s).unwrap_or(InvoiceStatus::Unpaid)
    }

    /// Load the line items belonging to an invoice
    async fn load_lines(&self, invoice_id: i64) -> AppResult<Vec<InvoiceLine>> {
        let rows = sqlx::query_as::<sqlx::Postgres, LineRow>(
            r#"
            SELECT id, invoice_id, description, quantity_minutes, unit_price, total
            FROM invoice_lines
            WHERE invoice_id = $1
            ORDER BY description
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error loading lines for invoice {}: {}",
                invoice_id, e
            );
            AppError::Database(format!("Failed to load invoice lines: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Invoice>> {
        debug!("Finding invoice by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding invoice {}: {}", id, e);
            AppError::Database(format!("Failed to find invoice: {}", e))
        })?;

        match result {
            Some(row) => {
                let mut invoice: Invoice = row.into();
                invoice.lines = self.load_lines(id).await?;
                Ok(Some(invoice))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn list_by_account(&self, account_id: i32) -> AppResult<Vec<Invoice>> {
        debug!("Listing invoices for account {}", account_id);

        let rows = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
            INVOICE_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error listing invoices for account {}: {}",
                account_id, e
            );
            AppError::Database(format!("Failed to list invoices: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, status: InvoiceStatus) -> AppResult<Invoice> {
        debug!("Updating invoice {} status to {}", id, status);

        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            r#"
            UPDATE invoices
            SET status = $2
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating invoice {}: {}", id, e);
            AppError::Database(format!("Failed to update invoice: {}", e))
        })?
        .ok_or_else(|| AppError::InvoiceNotFound(id.to_string()))?;

        let mut invoice: Invoice = row.into();
        invoice.lines = self.load_lines(id).await?;
        Ok(invoice)
    }
}

/// Helper struct for mapping invoice rows
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    account_id: i32,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            period_start: row.period_start,
            period_end: row.period_end,
            total: row.total,
            status: PgInvoiceRepository::parse_status(&row.status),
            created_at: row.created_at,
            due_date: row.due_date,
            lines: Vec::new(),
        }
    }
}

/// Helper struct for mapping line rows
#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: i64,
    invoice_id: i64,
    description: String,
    quantity_minutes: Decimal,
    unit_price: Decimal,
    total: Decimal,
}

impl From<LineRow> for InvoiceLine {
    fn from(row: LineRow) -> Self {
        Self {
            id: row.id,
            invoice_id: row.invoice_id,
            description: row.description,
            quantity_minutes: row.quantity_minutes,
            unit_price: row.unit_price,
            total: row.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_defaults_to_unpaid() {
        assert_eq!(
            PgInvoiceRepository::parse_status("paid"),
            InvoiceStatus::Paid
        );
        assert_eq!(
            PgInvoiceRepository::parse_status("bogus"),
            InvoiceStatus::Unpaid
        );
    }
}
