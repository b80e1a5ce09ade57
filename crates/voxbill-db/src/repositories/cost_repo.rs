//! Cost catalog repository implementation
//!
//! Provides PostgreSQL-backed storage for wholesale cost entries with an
//! optimized Longest Prefix Match (LPM) lookup for destination resolution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};
use voxbill_core::{
    models::CostEntry,
    traits::{CostRepository, Repository},
    AppError, AppResult,
};

/// PostgreSQL implementation of CostRepository
pub struct PgCostRepository {
    pool: PgPool,
}

impl PgCostRepository {
    /// Create a new cost catalog repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<CostEntry, i32> for PgCostRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<CostEntry>> {
        debug!("Finding cost entry by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            SELECT id, code, name, buy_price, created_at, updated_at
            FROM cost_entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding cost entry {}: {}", id, e);
            AppError::Database(format!("Failed to find cost entry: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<CostEntry>> {
        debug!(
            "Finding all cost entries with limit {} offset {}",
            limit, offset
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            SELECT id, code, name, buy_price, created_at, updated_at
            FROM cost_entries
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding cost entries: {}", e);
            AppError::Database(format!("Failed to fetch cost entries: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cost_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting cost entries: {}", e);
                AppError::Database(format!("Failed to count cost entries: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &CostEntry) -> AppResult<CostEntry> {
        debug!("Creating cost entry for code: {}", entity.code);

        let row = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            INSERT INTO cost_entries (code, name, buy_price)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, buy_price, created_at, updated_at
            "#,
        )
        .bind(&entity.code)
        .bind(&entity.name)
        .bind(entity.buy_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating cost entry: {}", e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!("Cost entry {} already exists", entity.code))
            } else {
                AppError::Database(format!("Failed to create cost entry: {}", e))
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &CostEntry) -> AppResult<CostEntry> {
        debug!("Updating cost entry: {}", entity.id);

        let row = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            UPDATE cost_entries
            SET code = $2,
                name = $3,
                buy_price = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, code, name, buy_price, created_at, updated_at
            "#,
        )
        .bind(entity.id)
        .bind(&entity.code)
        .bind(&entity.name)
        .bind(entity.buy_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating cost entry {}: {}", entity.id, e);
            AppError::Database(format!("Failed to update cost entry: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<bool> {
        debug!("Deleting cost entry: {}", id);

        let result = sqlx::query("DELETE FROM cost_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting cost entry {}: {}", id, e);
                AppError::Database(format!("Failed to delete cost entry: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CostRepository for PgCostRepository {
    #[instrument(skip(self))]
    async fn find_by_destination(&self, destination: &str) -> AppResult<Option<CostEntry>> {
        debug!("Finding cost entry for destination: {}", destination);

        // Normalize the destination (remove non-digits)
        let normalized = CostEntry::normalize_destination(destination);

        // Generate all possible prefixes from longest to shortest
        let prefixes = CostEntry::generate_prefixes(&normalized);

        if prefixes.is_empty() {
            warn!("No prefixes generated for destination: {}", destination);
            return Ok(None);
        }

        debug!("Generated {} prefixes for LPM lookup", prefixes.len());

        // Use PostgreSQL's ANY() for efficient prefix matching.
        // The query returns the longest matching code.
        let result = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            SELECT id, code, name, buy_price, created_at, updated_at
            FROM cost_entries
            WHERE code = ANY($1)
            ORDER BY LENGTH(code) DESC
            LIMIT 1
            "#,
        )
        .bind(&prefixes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error finding cost entry for destination {}: {}",
                destination, e
            );
            AppError::Database(format!("Failed to find cost entry: {}", e))
        })?;

        if result.is_none() {
            debug!("No cost entry found for destination: {}", destination);
        }

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_by_name(&self) -> AppResult<Vec<CostEntry>> {
        debug!("Listing cost entries ordered by name");

        let rows = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            SELECT id, code, name, buy_price, created_at, updated_at
            FROM cost_entries
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing cost entries: {}", e);
            AppError::Database(format!("Failed to list cost entries: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_for_matching(&self) -> AppResult<Vec<CostEntry>> {
        debug!("Listing cost entries in prefix-match order");

        let rows = sqlx::query_as::<sqlx::Postgres, CostEntryRow>(
            r#"
            SELECT id, code, name, buy_price, created_at, updated_at
            FROM cost_entries
            ORDER BY LENGTH(code) DESC, code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing cost entries for matching: {}", e);
            AppError::Database(format!("Failed to list cost entries: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CostEntryRow {
    id: i32,
    code: String,
    name: String,
    buy_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CostEntryRow> for CostEntry {
    fn from(row: CostEntryRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            buy_price: row.buy_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use voxbill_core::models::CostEntry;

    #[test]
    fn test_generate_prefixes_longest_first() {
        let prefixes = CostEntry::generate_prefixes("4420");
        assert_eq!(prefixes, vec!["4420", "442", "44", "4"]);
    }
}
