//! Call record repository implementation
//!
//! Provides PostgreSQL-backed storage for usage records. Records are
//! written once by the call-handling layer; the only later mutation is
//! the billed flag, set in bulk inside the invoice generator's
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use voxbill_core::{
    models::{CallRecord, CallStatus},
    traits::{CallRepository, Repository, UsageTotals},
    AppError, AppResult,
};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

const CALL_COLUMNS: &str = r#"
    id, call_uuid, account_id, caller_number, called_number,
    start_time, duration_secs, cost, status, billed, created_at
"#;

impl PgCallRepository {
    /// Create a new call record repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert database status string to enum
    fn parse_status(s: &str) -> CallStatus {
        CallStatus::from_str(s).unwrap_or(CallStatus::Failed)
    }
}

#[async_trait]
impl Repository<CallRecord, i64> for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<CallRecord>> {
        debug!("Finding call record by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            "SELECT {} FROM call_records WHERE id = $1",
            CALL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding call record {}: {}", id, e);
            AppError::Database(format!("Failed to find call record: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<CallRecord>> {
        debug!(
            "Finding all call records with limit {} offset {}",
            limit, offset
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            "SELECT {} FROM call_records ORDER BY start_time DESC LIMIT $1 OFFSET $2",
            CALL_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding call records: {}", e);
            AppError::Database(format!("Failed to fetch call records: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM call_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting call records: {}", e);
                AppError::Database(format!("Failed to count call records: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &CallRecord) -> AppResult<CallRecord> {
        debug!(
            "Creating call record for account {} to {}",
            entity.account_id, entity.called_number
        );

        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            r#"
            INSERT INTO call_records (
                call_uuid, account_id, caller_number, called_number,
                start_time, duration_secs, cost, status, billed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
            RETURNING {}
            "#,
            CALL_COLUMNS
        ))
        .bind(&entity.call_uuid)
        .bind(entity.account_id)
        .bind(&entity.caller_number)
        .bind(&entity.called_number)
        .bind(entity.start_time)
        .bind(entity.duration_secs)
        .bind(entity.cost)
        .bind(entity.status.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating call record: {}", e);
            AppError::Database(format!("Failed to create call record: {}", e))
        })?;

        Ok(row.into())
    }

    /// Call records are immutable apart from the billed flag; full
    /// updates are not supported.
    async fn update(&self, entity: &CallRecord) -> AppResult<CallRecord> {
        Err(AppError::InvalidInput(format!(
            "Call record {} is immutable",
            entity.id
        )))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> AppResult<bool> {
        debug!("Deleting call record: {}", id);

        let result = sqlx::query("DELETE FROM call_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting call record {}: {}", id, e);
                AppError::Database(format!("Failed to delete call record: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_unbilled_answered(
        &self,
        account_id: i32,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<Vec<CallRecord>> {
        debug!(
            "Finding unbilled answered records for account {} in [{}, {}]",
            account_id, period_start, period_end
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            r#"
            SELECT {}
            FROM call_records
            WHERE account_id = $1
              AND billed = FALSE
              AND status = 'answered'
              AND start_time >= $2
              AND start_time <= $3
            ORDER BY start_time
            "#,
            CALL_COLUMNS
        ))
        .bind(account_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error finding unbilled records for account {}: {}",
                account_id, e
            );
            AppError::Database(format!("Failed to fetch unbilled records: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, account_ids))]
    async fn usage_today(&self, account_ids: &[i32]) -> AppResult<UsageTotals> {
        if account_ids.is_empty() {
            return Ok(UsageTotals::default());
        }

        // COALESCE keeps empty sets at explicit zeros
        let row: (i64, Option<i64>, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   SUM(duration_secs)::BIGINT,
                   SUM(cost)
            FROM call_records
            WHERE account_id = ANY($1)
              AND start_time >= DATE_TRUNC('day', NOW())
            "#,
        )
        .bind(account_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error computing today's usage: {}", e);
            AppError::Database(format!("Failed to compute usage: {}", e))
        })?;

        Ok(UsageTotals {
            calls: row.0,
            minutes: Decimal::from(row.1.unwrap_or(0)) / Decimal::from(60),
            cost: row.2.unwrap_or(Decimal::ZERO),
        })
    }

    #[instrument(skip(self))]
    async fn list_filtered(
        &self,
        account_id: Option<i32>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<CallRecord>, i64)> {
        debug!(
            "Listing call records with filters: account={:?}, start={:?}, end={:?}",
            account_id, start_date, end_date
        );

        // Build dynamic query based on filters
        let mut query_str = format!("SELECT {} FROM call_records WHERE 1=1", CALL_COLUMNS);
        let mut count_query = String::from("SELECT COUNT(*) FROM call_records WHERE 1=1");

        if let Some(id) = account_id {
            let clause = format!(" AND account_id = {}", id);
            query_str.push_str(&clause);
            count_query.push_str(&clause);
        }

        if let Some(start) = start_date {
            let clause = format!(" AND start_time >= '{}'", start.to_rfc3339());
            query_str.push_str(&clause);
            count_query.push_str(&clause);
        }

        if let Some(end) = end_date {
            let clause = format!(" AND start_time <= '{}'", end.to_rfc3339());
            query_str.push_str(&clause);
            count_query.push_str(&clause);
        }

        query_str.push_str(&format!(
            " ORDER BY start_time DESC LIMIT {} OFFSET {}",
            limit, offset
        ));

        let total: (i64,) = sqlx::query_as(&count_query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting filtered call records: {}", e);
                AppError::Database(format!("Failed to count call records: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&query_str)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error fetching filtered call records: {}", e);
                AppError::Database(format!("Failed to fetch call records: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: i64,
    call_uuid: String,
    account_id: i32,
    caller_number: String,
    called_number: String,
    start_time: DateTime<Utc>,
    duration_secs: i32,
    cost: Decimal,
    status: String,
    billed: bool,
    created_at: DateTime<Utc>,
}

impl From<CallRow> for CallRecord {
    fn from(row: CallRow) -> Self {
        Self {
            id: row.id,
            call_uuid: row.call_uuid,
            account_id: row.account_id,
            caller_number: row.caller_number,
            called_number: row.called_number,
            start_time: row.start_time,
            duration_secs: row.duration_secs,
            cost: row.cost,
            status: PgCallRepository::parse_status(&row.status),
            billed: row.billed,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_defaults_to_failed() {
        assert_eq!(PgCallRepository::parse_status("answered"), CallStatus::Answered);
        assert_eq!(PgCallRepository::parse_status("???"), CallStatus::Failed);
    }
}
