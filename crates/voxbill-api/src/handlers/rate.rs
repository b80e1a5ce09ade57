//! Cost catalog and rate lookup handlers

use crate::dto::rate::{
    ConfiguredRateResponse, CostEntryRequest, CostEntryResponse, RateLookupParams,
};
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;
use voxbill_cache::RedisCache;
use voxbill_core::models::CostEntry;
use voxbill_core::traits::{CostRepository, Repository};
use voxbill_core::AppError;
use voxbill_db::{PgAccountRepository, PgCostRepository, PgPlanRepository};
use voxbill_services::RateEngine;

/// Build a rate engine, attaching the cache when one is configured
fn engine(
    pool: &PgPool,
    cache: Option<&web::Data<RedisCache>>,
) -> RateEngine<PgCostRepository, PgPlanRepository> {
    let cost_repo = Arc::new(PgCostRepository::new(pool.clone()));
    let plan_repo = Arc::new(PgPlanRepository::new(pool.clone()));

    match cache {
        Some(cache) => RateEngine::with_cache(cost_repo, plan_repo, Arc::new(cache.as_ref().clone())),
        None => RateEngine::new(cost_repo, plan_repo),
    }
}

/// List cost catalog entries ordered by destination name
///
/// GET /api/v1/rates/costs
#[instrument(skip(pool))]
pub async fn list_cost_entries(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    debug!("Listing cost catalog");

    let repo = PgCostRepository::new(pool.get_ref().clone());
    let entries = repo.list_by_name().await?;

    let response: Vec<CostEntryResponse> = entries.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Create a cost catalog entry
///
/// POST /api/v1/rates/costs
#[instrument(skip(pool, req))]
pub async fn create_cost_entry(
    pool: web::Data<PgPool>,
    req: web::Json<CostEntryRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(AppError::from)?;
    req.validate_business_rules().map_err(|e| {
        warn!("Cost entry validation failed: {}", e);
        AppError::Validation(e)
    })?;

    let repo = PgCostRepository::new(pool.get_ref().clone());
    let entry = CostEntry {
        code: req.code.clone(),
        name: req.name.clone(),
        buy_price: req.buy_price,
        ..Default::default()
    };

    let created = repo.create(&entry).await?;
    info!("Created cost entry {} ({})", created.id, created.code);

    Ok(HttpResponse::Created().json(ApiResponse::success(CostEntryResponse::from(created))))
}

/// Update a cost catalog entry (applies prospectively)
///
/// PUT /api/v1/rates/costs/{id}
#[instrument(skip(pool, req))]
pub async fn update_cost_entry(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    req: web::Json<CostEntryRequest>,
) -> Result<HttpResponse, AppError> {
    let entry_id = path.into_inner();
    req.validate().map_err(AppError::from)?;
    req.validate_business_rules().map_err(AppError::Validation)?;

    let repo = PgCostRepository::new(pool.get_ref().clone());
    let mut entry = repo
        .find_by_id(entry_id)
        .await?
        .ok_or_else(|| AppError::CostEntryNotFound(entry_id.to_string()))?;

    entry.code = req.code.clone();
    entry.name = req.name.clone();
    entry.buy_price = req.buy_price;

    let updated = repo.update(&entry).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CostEntryResponse::from(updated))))
}

/// Delete a cost catalog entry
///
/// DELETE /api/v1/rates/costs/{id}
#[instrument(skip(pool))]
pub async fn delete_cost_entry(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let entry_id = path.into_inner();

    let repo = PgCostRepository::new(pool.get_ref().clone());
    if !repo.delete(entry_id).await? {
        return Err(AppError::CostEntryNotFound(entry_id.to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Resolve a dialed number to its cost entry via longest prefix match
///
/// GET /api/v1/rates/lookup?destination=...
#[instrument(skip(pool, cache))]
pub async fn lookup_destination(
    pool: web::Data<PgPool>,
    cache: Option<web::Data<RedisCache>>,
    params: web::Query<RateLookupParams>,
) -> Result<HttpResponse, AppError> {
    params.validate().map_err(AppError::from)?;

    let engine = engine(pool.get_ref(), cache.as_ref());
    let entry = engine.find_destination(&params.destination).await?;

    let response = entry.map(CostEntryResponse::from);
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// The rates an account actually pays under its resolved plan
///
/// GET /api/v1/rates/accounts/{id}
#[instrument(skip(pool, cache))]
pub async fn account_rates(
    pool: web::Data<PgPool>,
    cache: Option<web::Data<RedisCache>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let account_repo = PgAccountRepository::new(pool.get_ref().clone());
    let account = account_repo
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

    let engine = engine(pool.get_ref(), cache.as_ref());
    let rates = engine.user_rates(&account).await?;

    let response: Vec<ConfiguredRateResponse> = rates.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Configure rate routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/rates")
            .route("/costs", web::get().to(list_cost_entries))
            .route("/costs", web::post().to(create_cost_entry))
            .route("/costs/{id}", web::put().to(update_cost_entry))
            .route("/costs/{id}", web::delete().to(delete_cost_entry))
            .route("/lookup", web::get().to(lookup_destination))
            .route("/accounts/{id}", web::get().to(account_rates)),
    );
}
