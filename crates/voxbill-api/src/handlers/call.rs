//! Call record handlers
//!
//! Ingestion endpoint for the call-handling layer plus filtered
//! listings. The cost stored on each record is computed here, at
//! termination time, from the account's resolved rates; invoicing later
//! reuses the stored figure instead of re-pricing.

use crate::dto::call::{CallListParams, CallRecordCreateRequest, CallRecordResponse};
use crate::dto::{ApiResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;
use voxbill_cache::RedisCache;
use voxbill_core::models::{CallRecord, CallStatus};
use voxbill_core::traits::{CallRepository, Repository};
use voxbill_core::AppError;
use voxbill_db::{PgAccountRepository, PgCallRepository, PgCostRepository, PgPlanRepository};
use voxbill_services::RateEngine;

/// Ingest a call record at termination
///
/// POST /api/v1/call-records
#[instrument(skip(pool, cache, req))]
pub async fn create_call_record(
    pool: web::Data<PgPool>,
    cache: Option<web::Data<RedisCache>>,
    req: web::Json<CallRecordCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(AppError::from)?;

    let status = CallStatus::from_str(&req.status)
        .ok_or_else(|| AppError::Validation(format!("Invalid call status: {}", req.status)))?;

    let account_repo = PgAccountRepository::new(pool.get_ref().clone());
    let account = account_repo
        .find_by_id(req.account_id)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(req.account_id.to_string()))?;

    // Only answered calls carry a cost
    let cost = if status.is_billable() {
        let cost_repo = Arc::new(PgCostRepository::new(pool.get_ref().clone()));
        let plan_repo = Arc::new(PgPlanRepository::new(pool.get_ref().clone()));
        let engine = match cache {
            Some(cache) => {
                RateEngine::with_cache(cost_repo, plan_repo, Arc::new(cache.as_ref().clone()))
            }
            None => RateEngine::new(cost_repo, plan_repo),
        };

        match engine
            .price_call(&account, &req.called_number, req.duration_secs)
            .await?
        {
            Some(cost) => cost,
            None => {
                warn!(
                    "No rate resolvable for {} (account {}), storing zero cost",
                    req.called_number, req.account_id
                );
                Decimal::ZERO
            }
        }
    } else {
        Decimal::ZERO
    };

    let mut record = CallRecord {
        account_id: req.account_id,
        caller_number: req.caller_number.clone(),
        called_number: req.called_number.clone(),
        start_time: req.start_time.unwrap_or_else(Utc::now),
        duration_secs: req.duration_secs,
        cost,
        status,
        ..Default::default()
    };
    if let Some(call_uuid) = &req.call_uuid {
        record.call_uuid = call_uuid.clone();
    }

    let call_repo = PgCallRepository::new(pool.get_ref().clone());
    let created = call_repo.create(&record).await?;

    info!(
        "Recorded call {} for account {}: {}s to {}, cost {}",
        created.id, created.account_id, created.duration_secs, created.called_number, created.cost
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(CallRecordResponse::from(created))))
}

/// List call records with filtering
///
/// GET /api/v1/call-records
#[instrument(skip(pool))]
pub async fn list_call_records(
    pool: web::Data<PgPool>,
    filters: web::Query<CallListParams>,
    pagination: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    pagination.validate().map_err(AppError::from)?;

    let repo = PgCallRepository::new(pool.get_ref().clone());
    let (records, total) = repo
        .list_filtered(
            filters.account_id,
            filters.start_date,
            filters.end_date,
            pagination.limit(),
            pagination.offset(),
        )
        .await?;

    let response: Vec<CallRecordResponse> = records.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        response,
        format!("{} records total", total),
    )))
}

/// Configure call record routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/call-records")
            .route("", web::post().to(create_call_record))
            .route("", web::get().to(list_call_records)),
    );
}
