//! Wallet handlers
//!
//! Balance reads, gateway-confirmed top-ups, and usage deductions.

use crate::dto::wallet::{
    DeductRequest, DeductResponse, PaymentResponse, TopupRequest, WalletResponse,
};
use crate::dto::{ApiResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;
use voxbill_core::config::BillingConfig;
use voxbill_core::models::PaymentMethod;
use voxbill_core::traits::WalletRepository;
use voxbill_core::AppError;
use voxbill_db::PgWalletRepository;
use voxbill_services::WalletService;

fn service(pool: &PgPool, billing: &BillingConfig) -> WalletService<PgWalletRepository> {
    WalletService::new(
        Arc::new(PgWalletRepository::new(pool.clone())),
        pool.clone(),
        billing.currency.clone(),
    )
}

/// Get an account's wallet, creating it at zero on first access
///
/// GET /api/v1/wallets/accounts/{id}
#[instrument(skip(pool, billing))]
pub async fn get_wallet(
    pool: web::Data<PgPool>,
    billing: web::Data<BillingConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let wallet = service(pool.get_ref(), billing.get_ref())
        .balance(account_id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(WalletResponse::from(wallet))))
}

/// Credit an account from a confirmed payment
///
/// POST /api/v1/wallets/accounts/{id}/topup
#[instrument(skip(pool, billing, req))]
pub async fn topup(
    pool: web::Data<PgPool>,
    billing: web::Data<BillingConfig>,
    path: web::Path<i32>,
    req: web::Json<TopupRequest>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    req.validate().map_err(AppError::from)?;

    let method = PaymentMethod::from_str(&req.method)
        .ok_or_else(|| AppError::Validation(format!("Invalid payment method: {}", req.method)))?;

    let payment = service(pool.get_ref(), billing.get_ref())
        .top_up(account_id, req.amount, method, req.external_ref.clone())
        .await?;

    info!(
        "Top-up {} for account {}: {} + {} tax",
        payment.invoice_number, account_id, payment.base_amount, payment.tax_amount
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(PaymentResponse::from(payment))))
}

/// Deduct usage from an account's wallet
///
/// POST /api/v1/wallets/accounts/{id}/deduct
///
/// Insufficient balance is a 200 with `deducted: false`, an expected
/// outcome the caller branches on.
#[instrument(skip(pool, billing, req))]
pub async fn deduct(
    pool: web::Data<PgPool>,
    billing: web::Data<BillingConfig>,
    path: web::Path<i32>,
    req: web::Json<DeductRequest>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    req.validate().map_err(AppError::from)?;

    let svc = service(pool.get_ref(), billing.get_ref());
    let deducted = svc.deduct(account_id, req.amount, &req.description).await?;
    let wallet = svc.balance(account_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(DeductResponse {
        deducted,
        balance: wallet.balance,
    })))
}

/// Read-only sufficiency check
///
/// GET /api/v1/wallets/accounts/{id}/sufficient?amount=...
#[instrument(skip(pool, billing))]
pub async fn has_sufficient_balance(
    pool: web::Data<PgPool>,
    billing: web::Data<BillingConfig>,
    path: web::Path<i32>,
    params: web::Query<SufficiencyParams>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let sufficient = service(pool.get_ref(), billing.get_ref())
        .has_sufficient_balance(account_id, params.amount)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(sufficient)))
}

/// Sufficiency check query parameters
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SufficiencyParams {
    /// Amount to check against the balance
    pub amount: Decimal,
}

/// List an account's payments
///
/// GET /api/v1/wallets/accounts/{id}/payments
#[instrument(skip(pool))]
pub async fn list_payments(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    pagination: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    pagination.validate().map_err(AppError::from)?;

    let repo = PgWalletRepository::new(pool.get_ref().clone());
    let (payments, total) = repo
        .list_payments(account_id, pagination.limit(), pagination.offset())
        .await?;

    let response: Vec<PaymentResponse> = payments.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        response,
        format!("{} payments total", total),
    )))
}

/// Configure wallet routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallets")
            .route("/accounts/{id}", web::get().to(get_wallet))
            .route("/accounts/{id}/topup", web::post().to(topup))
            .route("/accounts/{id}/deduct", web::post().to(deduct))
            .route(
                "/accounts/{id}/sufficient",
                web::get().to(has_sufficient_balance),
            )
            .route("/accounts/{id}/payments", web::get().to(list_payments)),
    );
}
