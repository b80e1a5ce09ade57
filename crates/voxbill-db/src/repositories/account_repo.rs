//! Account repository implementation
//!
//! Provides PostgreSQL-backed storage for the tenant tree with atomic
//! conditional updates for the concurrent-call counters. The admission
//! check and increment are a single statement so that concurrent call
//! attempts against one capacity pool can never overshoot the maximum.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use voxbill_core::{
    models::{Account, AccountRole, BillingType},
    traits::{AccountRepository, Repository},
    AppError, AppResult,
};

/// PostgreSQL implementation of AccountRepository
pub struct PgAccountRepository {
    pool: PgPool,
}

const ACCOUNT_COLUMNS: &str = r#"
    id, name, role, parent_id, reseller_id,
    max_concurrent_calls, active_calls, billing_type,
    per_channel_rate, plan_id, country_code, tax_id,
    created_at, updated_at
"#;

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert database role string to enum
    fn parse_role(s: &str) -> AccountRole {
        AccountRole::from_str(s).unwrap_or(AccountRole::User)
    }

    /// Convert database billing type string to enum
    fn parse_billing_type(s: &str) -> BillingType {
        BillingType::from_str(s).unwrap_or(BillingType::Prepaid)
    }
}

#[async_trait]
impl Repository<Account, i32> for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Account>> {
        debug!("Finding account by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding account {}: {}", id, e);
            AppError::Database(format!("Failed to find account: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Account>> {
        debug!(
            "Finding all accounts with limit {} offset {}",
            limit, offset
        );

        let rows = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            "SELECT {} FROM accounts ORDER BY id LIMIT $1 OFFSET $2",
            ACCOUNT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding accounts: {}", e);
            AppError::Database(format!("Failed to fetch accounts: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting accounts: {}", e);
                AppError::Database(format!("Failed to count accounts: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &Account) -> AppResult<Account> {
        debug!("Creating account: {}", entity.name);

        let row = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (
                name, role, parent_id, reseller_id,
                max_concurrent_calls, active_calls, billing_type,
                per_channel_rate, plan_id, country_code, tax_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&entity.name)
        .bind(entity.role.to_string())
        .bind(entity.parent_id)
        .bind(entity.reseller_id)
        .bind(entity.max_concurrent_calls)
        .bind(entity.active_calls)
        .bind(entity.billing_type.to_string())
        .bind(entity.per_channel_rate)
        .bind(entity.plan_id)
        .bind(&entity.country_code)
        .bind(&entity.tax_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating account: {}", e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!("Account {} already exists", entity.name))
            } else {
                AppError::Database(format!("Failed to create account: {}", e))
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &Account) -> AppResult<Account> {
        debug!("Updating account: {}", entity.id);

        let row = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            r#"
            UPDATE accounts
            SET name = $2,
                role = $3,
                reseller_id = $4,
                max_concurrent_calls = $5,
                billing_type = $6,
                per_channel_rate = $7,
                plan_id = $8,
                country_code = $9,
                tax_id = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(entity.id)
        .bind(&entity.name)
        .bind(entity.role.to_string())
        .bind(entity.reseller_id)
        .bind(entity.max_concurrent_calls)
        .bind(entity.billing_type.to_string())
        .bind(entity.per_channel_rate)
        .bind(entity.plan_id)
        .bind(&entity.country_code)
        .bind(&entity.tax_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating account {}: {}", entity.id, e);
            AppError::Database(format!("Failed to update account: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<bool> {
        debug!("Deleting account: {}", id);

        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting account {}: {}", id, e);
                AppError::Database(format!("Failed to delete account: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_parent(&self, parent_id: i32) -> AppResult<Vec<Account>> {
        debug!("Finding children of account {}", parent_id);

        let rows = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE parent_id = $1 ORDER BY id",
            ACCOUNT_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding children of {}: {}", parent_id, e);
            AppError::Database(format!("Failed to fetch children: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_ids_by_parent(&self, parent_id: i32) -> AppResult<Vec<i32>> {
        let rows: Vec<(i32,)> =
            sqlx::query_as("SELECT id FROM accounts WHERE parent_id = $1 ORDER BY id")
                .bind(parent_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error finding child ids of {}: {}", parent_id, e);
                    AppError::Database(format!("Failed to fetch child ids: {}", e))
                })?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, ids))]
    async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Account>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = ANY($1) ORDER BY id",
            ACCOUNT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching account batch: {}", e);
            AppError::Database(format!("Failed to fetch accounts: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Admission check and increment in one statement.
    ///
    /// The WHERE clause carries the capacity condition, so two racing
    /// calls serialize on the row and the loser sees no row to update.
    #[instrument(skip(self))]
    async fn try_start_call(&self, id: i32) -> AppResult<bool> {
        debug!("Attempting call admission on account {}", id);

        let result: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET active_calls = active_calls + 1,
                updated_at = NOW()
            WHERE id = $1
              AND active_calls < max_concurrent_calls
            RETURNING active_calls
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error incrementing calls for {}: {}", id, e);
            AppError::Database(format!("Failed to increment active calls: {}", e))
        })?;

        Ok(result.is_some())
    }

    /// Decrement clamped at zero: an already-idle counter is left alone
    /// and reported back as `false` so the caller can log the anomaly.
    #[instrument(skip(self))]
    async fn end_call(&self, id: i32) -> AppResult<bool> {
        debug!("Releasing call slot on account {}", id);

        let result: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET active_calls = active_calls - 1,
                updated_at = NOW()
            WHERE id = $1
              AND active_calls > 0
            RETURNING active_calls
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error decrementing calls for {}: {}", id, e);
            AppError::Database(format!("Failed to decrement active calls: {}", e))
        })?;

        Ok(result.is_some())
    }

    #[instrument(skip(self))]
    async fn update_parent(&self, id: i32, parent_id: Option<i32>) -> AppResult<Account> {
        debug!("Reparenting account {} under {:?}", id, parent_id);

        let row = sqlx::query_as::<sqlx::Postgres, AccountRow>(&format!(
            r#"
            UPDATE accounts
            SET parent_id = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error reparenting account {}: {}", id, e);
            AppError::Database(format!("Failed to reparent account: {}", e))
        })?;

        Ok(row.into())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i32,
    name: String,
    role: String,
    parent_id: Option<i32>,
    reseller_id: Option<i32>,
    max_concurrent_calls: i32,
    active_calls: i32,
    billing_type: String,
    per_channel_rate: Decimal,
    plan_id: Option<i32>,
    country_code: Option<String>,
    tax_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            role: PgAccountRepository::parse_role(&row.role),
            parent_id: row.parent_id,
            reseller_id: row.reseller_id,
            max_concurrent_calls: row.max_concurrent_calls,
            active_calls: row.active_calls,
            billing_type: PgAccountRepository::parse_billing_type(&row.billing_type),
            per_channel_rate: row.per_channel_rate,
            plan_id: row.plan_id,
            country_code: row.country_code,
            tax_id: row.tax_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_defaults_to_user() {
        assert_eq!(PgAccountRepository::parse_role("reseller"), AccountRole::Reseller);
        assert_eq!(PgAccountRepository::parse_role("garbage"), AccountRole::User);
    }

    #[test]
    fn test_parse_billing_type_defaults_to_prepaid() {
        assert_eq!(
            PgAccountRepository::parse_billing_type("postpaid"),
            BillingType::Postpaid
        );
        assert_eq!(
            PgAccountRepository::parse_billing_type(""),
            BillingType::Prepaid
        );
    }
}
