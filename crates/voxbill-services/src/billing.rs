//! Invoice generator service
//!
//! Periodic batch job that turns unbilled answered call records into an
//! invoice. The selection, invoice insert, and billed-flag update run in
//! one transaction: the initial `FOR UPDATE` select doubles as the claim
//! step, so two runs for the same account and period serialize instead
//! of double-billing, and a crash mid-way leaves every record unbilled.
//!
//! Pricing is NOT recomputed here: each record carries the cost computed
//! at call time, and the catalog is consulted only to resolve
//! destination names for grouping.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};
use voxbill_core::{
    models::{CostEntry, Invoice, InvoiceLine, InvoiceStatus},
    traits::CostRepository,
    AppError, AppResult,
};

use crate::constants::{FALLBACK_PREFIX_DIGITS, INVOICE_DUE_DAYS, LINE_PRECISION};

/// Invoice generator
pub struct InvoiceGenerator<C: CostRepository> {
    cost_repo: Arc<C>,
    pool: PgPool,
}

/// One claimed usage record, as selected inside the transaction
#[derive(Debug, sqlx::FromRow)]
struct ClaimedRecord {
    id: i64,
    called_number: String,
    duration_secs: i32,
    cost: Decimal,
}

impl<C: CostRepository> InvoiceGenerator<C> {
    /// Create a new invoice generator
    pub fn new(cost_repo: Arc<C>, pool: PgPool) -> Self {
        Self { cost_repo, pool }
    }

    /// Resolve a dialed number to a destination name by longest prefix
    ///
    /// `catalog` must be ordered by code length descending (the
    /// repository's prefix-match order); the first code that prefixes
    /// the number's digits wins. Unmatched numbers get a labeled
    /// placeholder instead of being dropped.
    pub fn resolve_destination_name(catalog: &[CostEntry], called_number: &str) -> String {
        let digits = CostEntry::normalize_destination(called_number);

        for entry in catalog {
            if entry.matches(&digits) {
                return entry.name.clone();
            }
        }

        let shown = &digits[..digits.len().min(FALLBACK_PREFIX_DIGITS)];
        format!("International (+{}...)", shown)
    }

    /// Group claimed records by resolved name into invoice lines
    ///
    /// Quantities and totals are kept at 5-decimal precision; the unit
    /// price is the derived average total/minutes, defined as 0 when a
    /// group has no billable minutes.
    fn build_lines(catalog: &[CostEntry], records: &[ClaimedRecord]) -> Vec<InvoiceLine> {
        let mut groups: BTreeMap<String, (i64, Decimal)> = BTreeMap::new();

        for record in records {
            let name = Self::resolve_destination_name(catalog, &record.called_number);
            let entry = groups.entry(name).or_insert((0, Decimal::ZERO));
            entry.0 += i64::from(record.duration_secs);
            entry.1 += record.cost;
        }

        groups
            .into_iter()
            .map(|(description, (total_secs, total_cost))| {
                let minutes = (Decimal::from(total_secs) / Decimal::from(60))
                    .round_dp_with_strategy(LINE_PRECISION, RoundingStrategy::MidpointAwayFromZero);
                let total = total_cost
                    .round_dp_with_strategy(LINE_PRECISION, RoundingStrategy::MidpointAwayFromZero);
                let unit_price = if minutes.is_zero() {
                    Decimal::ZERO
                } else {
                    (total / minutes).round_dp_with_strategy(
                        LINE_PRECISION,
                        RoundingStrategy::MidpointAwayFromZero,
                    )
                };

                InvoiceLine {
                    id: 0,
                    invoice_id: 0,
                    description,
                    quantity_minutes: minutes,
                    unit_price,
                    total,
                }
            })
            .collect()
    }

    /// Generate an invoice for an account over a billing period
    ///
    /// Returns `Ok(None)` when no unbilled answered records fall in the
    /// period; re-running for an already-billed period is a safe no-op.
    #[instrument(skip(self))]
    pub async fn generate_invoice(
        &self,
        account_id: i32,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<Option<Invoice>> {
        info!(
            "Generating invoice for account {} over [{}, {}]",
            account_id, period_start, period_end
        );

        // The catalog is read outside the transaction to keep the
        // claim-to-commit window short
        let catalog = self.cost_repo.list_for_matching().await?;

        // Start transaction
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Claim step: the row locks serialize concurrent runs for the
        // same account/period
        let records = sqlx::query_as::<sqlx::Postgres, ClaimedRecord>(
            r#"
            SELECT id, called_number, duration_secs, cost
            FROM call_records
            WHERE account_id = $1
              AND billed = FALSE
              AND status = 'answered'
              AND start_time >= $2
              AND start_time <= $3
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            error!(
                "Failed to claim records for account {}: {}",
                account_id, e
            );
            AppError::Database(format!("Failed to claim call records: {}", e))
        })?;

        if records.is_empty() {
            debug!(
                "No unbilled answered records for account {} in period, no invoice",
                account_id
            );
            return Ok(None);
        }

        let record_ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let lines = Self::build_lines(&catalog, &records);
        let total: Decimal = lines.iter().map(|l| l.total).sum();

        let created_at = Utc::now();
        let due_date = created_at + Duration::days(INVOICE_DUE_DAYS);

        // Create the invoice
        let invoice_id: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO invoices (
                account_id, period_start, period_end,
                total, status, created_at, due_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(period_start)
        .bind(period_end)
        .bind(total)
        .bind(InvoiceStatus::Unpaid.to_string())
        .bind(created_at)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create invoice: {}", e);
            AppError::Database(format!("Failed to create invoice: {}", e))
        })?;

        // Create its line items
        let mut stored_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let line_id: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO invoice_lines (
                    invoice_id, description, quantity_minutes, unit_price, total
                )
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(invoice_id.0)
            .bind(&line.description)
            .bind(line.quantity_minutes)
            .bind(line.unit_price)
            .bind(line.total)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to create invoice line: {}", e);
                AppError::Database(format!("Failed to create invoice line: {}", e))
            })?;

            stored_lines.push(InvoiceLine {
                id: line_id.0,
                invoice_id: invoice_id.0,
                ..line
            });
        }

        // Mark exactly the claimed records billed, in the same unit
        let marked = sqlx::query("UPDATE call_records SET billed = TRUE WHERE id = ANY($1)")
            .bind(&record_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to mark records billed: {}", e);
                AppError::Database(format!("Failed to mark records billed: {}", e))
            })?;

        if marked.rows_affected() != record_ids.len() as u64 {
            // The claim locks make this unreachable; refuse to commit a
            // mismatched bill anyway
            error!(
                "Billed-flag update touched {} of {} claimed records, rolling back",
                marked.rows_affected(),
                record_ids.len()
            );
            return Err(AppError::Transaction(
                "Claimed record set changed during invoice generation".to_string(),
            ));
        }

        // Commit transaction
        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Generated invoice {} for account {}: {} records, total {}",
            invoice_id.0,
            account_id,
            record_ids.len(),
            total
        );

        Ok(Some(Invoice {
            id: invoice_id.0,
            account_id,
            period_start,
            period_end,
            total,
            status: InvoiceStatus::Unpaid,
            created_at,
            due_date,
            lines: stored_lines,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    type Generator = InvoiceGenerator<voxbill_db::PgCostRepository>;

    fn catalog() -> Vec<CostEntry> {
        // Ordered by code length descending, as list_for_matching returns
        vec![
            CostEntry {
                id: 2,
                code: "447".to_string(),
                name: "United Kingdom Mobile".to_string(),
                buy_price: dec!(0.02),
                ..Default::default()
            },
            CostEntry {
                id: 1,
                code: "44".to_string(),
                name: "United Kingdom".to_string(),
                buy_price: dec!(0.01),
                ..Default::default()
            },
        ]
    }

    fn record(id: i64, called: &str, secs: i32, cost: Decimal) -> ClaimedRecord {
        ClaimedRecord {
            id,
            called_number: called.to_string(),
            duration_secs: secs,
            cost,
        }
    }

    #[test]
    fn test_resolve_name_longest_prefix_wins() {
        let catalog = catalog();

        assert_eq!(
            Generator::resolve_destination_name(&catalog, "4477009001"),
            "United Kingdom Mobile"
        );
        assert_eq!(
            Generator::resolve_destination_name(&catalog, "+44-20-7946-0000"),
            "United Kingdom"
        );
    }

    #[test]
    fn test_resolve_name_fallback_label() {
        let catalog = catalog();

        assert_eq!(
            Generator::resolve_destination_name(&catalog, "97150123456"),
            "International (+9715...)"
        );
        // Short numbers show whatever digits exist
        assert_eq!(
            Generator::resolve_destination_name(&catalog, "99"),
            "International (+99...)"
        );
    }

    #[test]
    fn test_build_lines_groups_and_averages() {
        let catalog = catalog();
        // 12.5 minutes and 1.875 total cost across two UK fixed-line calls
        let records = vec![
            record(1, "442079460000", 300, dec!(0.75)),
            record(2, "442079460001", 450, dec!(1.125)),
        ];

        let lines = Generator::build_lines(&catalog, &records);
        assert_eq!(lines.len(), 1);

        let line = &lines[0];
        assert_eq!(line.description, "United Kingdom");
        assert_eq!(line.quantity_minutes, dec!(12.5));
        assert_eq!(line.total, dec!(1.875));
        assert_eq!(line.unit_price, dec!(0.15));
    }

    #[test]
    fn test_build_lines_zero_minutes_zero_unit_price() {
        let catalog = catalog();
        let records = vec![record(1, "442079460000", 0, dec!(0.05))];

        let lines = Generator::build_lines(&catalog, &records);
        assert_eq!(lines[0].quantity_minutes, Decimal::ZERO);
        assert_eq!(lines[0].unit_price, Decimal::ZERO);
        assert_eq!(lines[0].total, dec!(0.05));
    }

    #[test]
    fn test_build_lines_ordered_by_description() {
        let mut catalog = catalog();
        catalog.push(CostEntry {
            id: 3,
            code: "34".to_string(),
            name: "Spain".to_string(),
            buy_price: dec!(0.015),
            ..Default::default()
        });

        let records = vec![
            record(1, "442079460000", 60, dec!(0.012)),
            record(2, "34911234567", 60, dec!(0.018)),
            record(3, "4477009001", 60, dec!(0.024)),
        ];

        let lines = Generator::build_lines(&catalog, &records);
        let descriptions: Vec<&str> = lines.iter().map(|l| l.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec!["Spain", "United Kingdom", "United Kingdom Mobile"]
        );
    }

    #[test]
    fn test_line_precision_is_five_decimals() {
        let catalog = catalog();
        // 100 seconds = 1.666666... minutes -> 1.66667 at 5 dp
        let records = vec![record(1, "442079460000", 100, dec!(0.0167))];

        let lines = Generator::build_lines(&catalog, &records);
        assert_eq!(lines[0].quantity_minutes, dec!(1.66667));
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_generate_invoice_idempotent() {
        let pool = sqlx::PgPool::connect(
            &std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/voxbill".to_string()),
        )
        .await
        .unwrap();

        let generator = InvoiceGenerator::new(
            Arc::new(voxbill_db::PgCostRepository::new(pool.clone())),
            pool,
        );

        let start = Utc::now() - Duration::days(30);
        let end = Utc::now();

        let first = generator.generate_invoice(1, start, end).await.unwrap();
        let second = generator.generate_invoice(1, start, end).await.unwrap();

        if first.is_some() {
            assert!(second.is_none(), "second run must be a no-op");
        }
    }
}
