//! Wallet and payment repository implementation
//!
//! Balance mutations are single conditional statements: credits add
//! unconditionally, debits carry the sufficiency check in the WHERE
//! clause so a concurrent top-up and deduct can never interleave
//! partially.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use voxbill_core::{
    models::{Payment, PaymentMethod, Wallet},
    traits::WalletRepository,
    AppError, AppResult,
};

/// PostgreSQL implementation of WalletRepository
pub struct PgWalletRepository {
    pool: PgPool,
}

const WALLET_COLUMNS: &str = r#"
    id, account_id, balance, currency, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, account_id, base_amount, tax_amount, total_amount,
    tax_type, method, invoice_number, external_ref, created_at
"#;

impl PgWalletRepository {
    /// Create a new wallet repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    /// Idempotent get-or-create: the INSERT is a no-op when the wallet
    /// already exists, and the following SELECT always returns one row.
    #[instrument(skip(self))]
    async fn get_or_create(&self, account_id: i32, currency: &str) -> AppResult<Wallet> {
        debug!("Fetching wallet for account {}", account_id);

        sqlx::query(
            r#"
            INSERT INTO wallets (account_id, balance, currency)
            VALUES ($1, 0, $2)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(currency)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating wallet for {}: {}", account_id, e);
            AppError::Database(format!("Failed to create wallet: {}", e))
        })?;

        let row = sqlx::query_as::<sqlx::Postgres, WalletRow>(&format!(
            "SELECT {} FROM wallets WHERE account_id = $1",
            WALLET_COLUMNS
        ))
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching wallet for {}: {}", account_id, e);
            AppError::Database(format!("Failed to fetch wallet: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn credit(&self, account_id: i32, amount: Decimal) -> AppResult<Decimal> {
        debug!("Crediting wallet of account {} by {}", account_id, amount);

        let result: (Decimal,) = sqlx::query_as(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                updated_at = NOW()
            WHERE account_id = $1
            RETURNING balance
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error crediting wallet of {}: {}", account_id, e);
            AppError::Database(format!("Failed to credit wallet: {}", e))
        })?;

        Ok(result.0)
    }

    /// The sufficiency check and the debit are one statement; an
    /// insufficient balance simply matches no row.
    #[instrument(skip(self))]
    async fn try_debit(&self, account_id: i32, amount: Decimal) -> AppResult<bool> {
        debug!("Debiting wallet of account {} by {}", account_id, amount);

        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance - $2,
                updated_at = NOW()
            WHERE account_id = $1
              AND balance >= $2
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error debiting wallet of {}: {}", account_id, e);
            AppError::Database(format!("Failed to debit wallet: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, account_ids))]
    async fn balance_total(&self, account_ids: &[i32]) -> AppResult<Decimal> {
        if account_ids.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let row: (Option<Decimal>,) =
            sqlx::query_as("SELECT SUM(balance) FROM wallets WHERE account_id = ANY($1)")
                .bind(account_ids)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error summing balances: {}", e);
                    AppError::Database(format!("Failed to sum balances: {}", e))
                })?;

        Ok(row.0.unwrap_or(Decimal::ZERO))
    }

    #[instrument(skip(self))]
    async fn list_payments(
        &self,
        account_id: i32,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Payment>, i64)> {
        debug!("Listing payments for account {}", account_id);

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting payments for {}: {}", account_id, e);
                AppError::Database(format!("Failed to count payments: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            SELECT {}
            FROM payments
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing payments for {}: {}", account_id, e);
            AppError::Database(format!("Failed to list payments: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping wallet rows
#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: i32,
    account_id: i32,
    balance: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            balance: row.balance,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Helper struct for mapping payment rows
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    account_id: i32,
    base_amount: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    tax_type: String,
    method: String,
    invoice_number: String,
    external_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            base_amount: row.base_amount,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            tax_type: row.tax_type,
            method: PaymentMethod::from_str(&row.method).unwrap_or(PaymentMethod::Gateway),
            invoice_number: row.invoice_number,
            external_ref: row.external_ref,
            created_at: row.created_at,
        }
    }
}
