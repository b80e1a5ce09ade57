//! Pricing plan repository implementation
//!
//! Provides PostgreSQL-backed storage for pricing plans, including
//! lookup of the platform's predefined 0%-markup default plan.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use voxbill_core::{
    models::{PlanType, PricingPlan},
    traits::{PlanRepository, Repository},
    AppError, AppResult,
};

/// PostgreSQL implementation of PlanRepository
pub struct PgPlanRepository {
    pool: PgPool,
}

const PLAN_COLUMNS: &str = r#"
    id, name, plan_type, percent_markup, fixed_markup,
    min_markup, max_markup, rounding_decimals, billing_increment,
    is_predefined, is_active, created_at, updated_at
"#;

impl PgPlanRepository {
    /// Create a new plan repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert database plan type string to enum
    fn parse_plan_type(s: &str) -> PlanType {
        PlanType::from_str(s).unwrap_or(PlanType::Percentage)
    }
}

#[async_trait]
impl Repository<PricingPlan, i32> for PgPlanRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<PricingPlan>> {
        debug!("Finding plan by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            "SELECT {} FROM pricing_plans WHERE id = $1",
            PLAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding plan {}: {}", id, e);
            AppError::Database(format!("Failed to find plan: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<PricingPlan>> {
        debug!("Finding all plans with limit {} offset {}", limit, offset);

        let rows = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            "SELECT {} FROM pricing_plans ORDER BY id LIMIT $1 OFFSET $2",
            PLAN_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding plans: {}", e);
            AppError::Database(format!("Failed to fetch plans: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pricing_plans")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting plans: {}", e);
                AppError::Database(format!("Failed to count plans: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &PricingPlan) -> AppResult<PricingPlan> {
        debug!("Creating plan: {}", entity.name);

        let row = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            r#"
            INSERT INTO pricing_plans (
                name, plan_type, percent_markup, fixed_markup,
                min_markup, max_markup, rounding_decimals, billing_increment,
                is_predefined, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PLAN_COLUMNS
        ))
        .bind(&entity.name)
        .bind(entity.plan_type.to_string())
        .bind(entity.percent_markup)
        .bind(entity.fixed_markup)
        .bind(entity.min_markup)
        .bind(entity.max_markup)
        .bind(entity.rounding_decimals as i32)
        .bind(entity.billing_increment)
        .bind(entity.is_predefined)
        .bind(entity.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating plan: {}", e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!("Plan {} already exists", entity.name))
            } else {
                AppError::Database(format!("Failed to create plan: {}", e))
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &PricingPlan) -> AppResult<PricingPlan> {
        debug!("Updating plan: {}", entity.id);

        let row = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            r#"
            UPDATE pricing_plans
            SET name = $2,
                plan_type = $3,
                percent_markup = $4,
                fixed_markup = $5,
                min_markup = $6,
                max_markup = $7,
                rounding_decimals = $8,
                billing_increment = $9,
                is_active = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PLAN_COLUMNS
        ))
        .bind(entity.id)
        .bind(&entity.name)
        .bind(entity.plan_type.to_string())
        .bind(entity.percent_markup)
        .bind(entity.fixed_markup)
        .bind(entity.min_markup)
        .bind(entity.max_markup)
        .bind(entity.rounding_decimals as i32)
        .bind(entity.billing_increment)
        .bind(entity.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating plan {}: {}", entity.id, e);
            AppError::Database(format!("Failed to update plan: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<bool> {
        debug!("Deleting plan: {}", id);

        let result = sqlx::query("DELETE FROM pricing_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting plan {}: {}", id, e);
                AppError::Database(format!("Failed to delete plan: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> AppResult<Option<PricingPlan>> {
        debug!("Finding plan by name: {}", name);

        let result = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            "SELECT {} FROM pricing_plans WHERE name = $1",
            PLAN_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding plan by name: {}", e);
            AppError::Database(format!("Failed to find plan: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    /// The predefined 0%-markup plan that accounts without an assigned
    /// plan fall back to. Its absence is an environment-setup error
    /// handled by the caller.
    #[instrument(skip(self))]
    async fn find_default(&self) -> AppResult<Option<PricingPlan>> {
        debug!("Finding predefined default plan");

        let result = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            r#"
            SELECT {}
            FROM pricing_plans
            WHERE is_predefined = TRUE
              AND plan_type = 'percentage'
              AND percent_markup = 0
              AND is_active = TRUE
            ORDER BY id
            LIMIT 1
            "#,
            PLAN_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding default plan: {}", e);
            AppError::Database(format!("Failed to find default plan: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> AppResult<Vec<PricingPlan>> {
        debug!("Listing active plans");

        let rows = sqlx::query_as::<sqlx::Postgres, PlanRow>(&format!(
            "SELECT {} FROM pricing_plans WHERE is_active = TRUE ORDER BY name",
            PLAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing active plans: {}", e);
            AppError::Database(format!("Failed to list plans: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: i32,
    name: String,
    plan_type: String,
    percent_markup: Decimal,
    fixed_markup: Decimal,
    min_markup: Decimal,
    max_markup: Decimal,
    rounding_decimals: i32,
    billing_increment: i32,
    is_predefined: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PricingPlan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            plan_type: PgPlanRepository::parse_plan_type(&row.plan_type),
            percent_markup: row.percent_markup,
            fixed_markup: row.fixed_markup,
            min_markup: row.min_markup,
            max_markup: row.max_markup,
            rounding_decimals: row.rounding_decimals.max(0) as u32,
            billing_increment: row.billing_increment,
            is_predefined: row.is_predefined,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_type_defaults_to_percentage() {
        assert_eq!(PgPlanRepository::parse_plan_type("free"), PlanType::Free);
        assert_eq!(
            PgPlanRepository::parse_plan_type("unknown"),
            PlanType::Percentage
        );
    }
}
