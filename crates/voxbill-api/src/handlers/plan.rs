//! Pricing plan handlers

use crate::dto::plan::{PlanCreateRequest, PlanResponse};
use crate::dto::rate::ConfiguredRateResponse;
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;
use voxbill_core::traits::{PlanRepository, Repository};
use voxbill_core::AppError;
use voxbill_db::{PgCostRepository, PgPlanRepository};
use voxbill_services::RateEngine;

/// List all plans
///
/// GET /api/v1/plans
#[instrument(skip(pool))]
pub async fn list_plans(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    debug!("Listing all plans");

    let repo = PgPlanRepository::new(pool.get_ref().clone());
    let plans = repo.find_all(1000, 0).await?;

    let response: Vec<PlanResponse> = plans.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// List active plans
///
/// GET /api/v1/plans/active
#[instrument(skip(pool))]
pub async fn list_active_plans(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    debug!("Listing active plans");

    let repo = PgPlanRepository::new(pool.get_ref().clone());
    let plans = repo.list_active().await?;

    let response: Vec<PlanResponse> = plans.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Get a single plan
///
/// GET /api/v1/plans/{id}
#[instrument(skip(pool))]
pub async fn get_plan(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let plan_id = path.into_inner();
    debug!(id = plan_id, "Getting plan");

    let repo = PgPlanRepository::new(pool.get_ref().clone());
    let plan = repo
        .find_by_id(plan_id)
        .await?
        .ok_or_else(|| AppError::PlanNotFound(plan_id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PlanResponse::from(plan))))
}

/// Create a custom plan
///
/// POST /api/v1/plans
#[instrument(skip(pool, req))]
pub async fn create_plan(
    pool: web::Data<PgPool>,
    req: web::Json<PlanCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Plan creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let plan = req.into_inner().into_plan().map_err(AppError::Validation)?;
    debug!(name = %plan.name, "Creating plan");

    let engine = RateEngine::new(
        Arc::new(PgCostRepository::new(pool.get_ref().clone())),
        Arc::new(PgPlanRepository::new(pool.get_ref().clone())),
    );
    let created = engine.create_custom_plan(plan).await?;

    info!("Created plan {} ({})", created.id, created.name);
    Ok(HttpResponse::Created().json(ApiResponse::success(PlanResponse::from(created))))
}

/// A plan's configured rates: catalog with sell price, profit, margin
///
/// GET /api/v1/plans/{id}/rates
#[instrument(skip(pool))]
pub async fn plan_rates(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let plan_id = path.into_inner();

    let plan_repo = Arc::new(PgPlanRepository::new(pool.get_ref().clone()));
    let plan = plan_repo
        .find_by_id(plan_id)
        .await?
        .ok_or_else(|| AppError::PlanNotFound(plan_id.to_string()))?;

    let engine = RateEngine::new(
        Arc::new(PgCostRepository::new(pool.get_ref().clone())),
        plan_repo,
    );
    let rates = engine.configured_rates(&plan).await?;

    let response: Vec<ConfiguredRateResponse> = rates.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Configure plan routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/plans")
            .route("", web::get().to(list_plans))
            .route("", web::post().to(create_plan))
            .route("/active", web::get().to(list_active_plans))
            .route("/{id}", web::get().to(get_plan))
            .route("/{id}/rates", web::get().to(plan_rates)),
    );
}
