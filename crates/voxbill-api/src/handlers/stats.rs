//! Statistics handlers
//!
//! Read-side rollups over the tenant tree, cached for a short TTL when
//! Redis is available. Cache faults fall back to a live computation.

use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use voxbill_cache::{keys, RedisCache};
use voxbill_core::models::{CompanyStats, ResellerStats};
use voxbill_core::AppError;
use voxbill_db::{PgAccountRepository, PgCallRepository, PgWalletRepository};
use voxbill_services::constants::STATS_CACHE_TTL;
use voxbill_services::HierarchyDirectory;

fn directory(
    pool: &PgPool,
) -> HierarchyDirectory<PgAccountRepository, PgCallRepository, PgWalletRepository> {
    HierarchyDirectory::new(
        Arc::new(PgAccountRepository::new(pool.clone())),
        Arc::new(PgCallRepository::new(pool.clone())),
        Arc::new(PgWalletRepository::new(pool.clone())),
    )
}

/// Aggregate statistics for a reseller's subtree
///
/// GET /api/v1/stats/resellers/{id}
#[instrument(skip(pool, cache))]
pub async fn reseller_stats(
    pool: web::Data<PgPool>,
    cache: Option<web::Data<RedisCache>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let reseller_id = path.into_inner();
    let key = keys::reseller_stats_key(reseller_id);

    if let Some(cache) = &cache {
        match cache.get::<ResellerStats>(&key).await {
            Ok(Some(stats)) => {
                debug!("Reseller stats cache HIT for {}", reseller_id);
                return Ok(HttpResponse::Ok().json(ApiResponse::success(stats)));
            }
            Ok(None) => {}
            Err(e) => warn!("Stats cache read failed for {}: {}", reseller_id, e),
        }
    }

    let stats = directory(pool.get_ref()).reseller_stats(reseller_id).await?;

    if let Some(cache) = &cache {
        if let Err(e) = cache.set(&key, &stats, STATS_CACHE_TTL).await {
            warn!("Stats cache write failed for {}: {}", reseller_id, e);
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

/// Aggregate statistics for a company and its users
///
/// GET /api/v1/stats/companies/{id}
#[instrument(skip(pool, cache))]
pub async fn company_stats(
    pool: web::Data<PgPool>,
    cache: Option<web::Data<RedisCache>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let company_id = path.into_inner();
    let key = keys::company_stats_key(company_id);

    if let Some(cache) = &cache {
        match cache.get::<CompanyStats>(&key).await {
            Ok(Some(stats)) => {
                debug!("Company stats cache HIT for {}", company_id);
                return Ok(HttpResponse::Ok().json(ApiResponse::success(stats)));
            }
            Ok(None) => {}
            Err(e) => warn!("Stats cache read failed for {}: {}", company_id, e),
        }
    }

    let stats = directory(pool.get_ref()).company_stats(company_id).await?;

    if let Some(cache) = &cache {
        if let Err(e) = cache.set(&key, &stats, STATS_CACHE_TTL).await {
            warn!("Stats cache write failed for {}: {}", company_id, e);
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

/// Configure stats routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stats")
            .route("/resellers/{id}", web::get().to(reseller_stats))
            .route("/companies/{id}", web::get().to(company_stats)),
    );
}
