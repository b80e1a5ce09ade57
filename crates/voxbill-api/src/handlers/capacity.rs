//! Capacity handlers
//!
//! The call-handling layer hits these endpoints around every call:
//! admission before connecting audio, start/end events at setup and
//! teardown.

use crate::dto::capacity::{AdmissionResponse, CallEventRequest, ChannelInfoResponse};
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, instrument};
use voxbill_core::AppError;
use voxbill_db::PgAccountRepository;
use voxbill_services::CapacityManager;

fn manager(pool: &PgPool) -> CapacityManager<PgAccountRepository> {
    CapacityManager::new(Arc::new(PgAccountRepository::new(pool.clone())))
}

/// Read-only admission check
///
/// GET /api/v1/capacity/accounts/{id}/can-start
#[instrument(skip(pool))]
pub async fn can_start_call(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let admitted = manager(pool.get_ref()).can_start_call(account_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(AdmissionResponse { admitted })))
}

/// Admit a call and take a channel
///
/// POST /api/v1/capacity/calls/start
///
/// A refused admission is a 200 with `admitted: false`: an expected
/// outcome, not an error.
#[instrument(skip(pool, req))]
pub async fn start_call(
    pool: web::Data<PgPool>,
    req: web::Json<CallEventRequest>,
) -> Result<HttpResponse, AppError> {
    debug!("Call start for account {}", req.account_id);

    let admitted = manager(pool.get_ref()).start_call(req.account_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(AdmissionResponse { admitted })))
}

/// Release a channel at call teardown
///
/// POST /api/v1/capacity/calls/end
#[instrument(skip(pool, req))]
pub async fn end_call(
    pool: web::Data<PgPool>,
    req: web::Json<CallEventRequest>,
) -> Result<HttpResponse, AppError> {
    debug!("Call end for account {}", req.account_id);

    manager(pool.get_ref()).end_call(req.account_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(())))
}

/// Channel information for an account's capacity pool
///
/// GET /api/v1/capacity/accounts/{id}/channels
#[instrument(skip(pool))]
pub async fn channel_info(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let info = manager(pool.get_ref()).channel_info(account_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChannelInfoResponse::from(info))))
}

/// Configure capacity routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/capacity")
            .route("/accounts/{id}/can-start", web::get().to(can_start_call))
            .route("/accounts/{id}/channels", web::get().to(channel_info))
            .route("/calls/start", web::post().to(start_call))
            .route("/calls/end", web::post().to(end_call)),
    );
}
