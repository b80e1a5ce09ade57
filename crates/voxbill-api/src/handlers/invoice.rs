//! Invoice handlers
//!
//! Generation is triggered per account and period by a scheduler or
//! operator; status transitions arrive from the payment-confirmation
//! collaborator.

use crate::dto::billing::{GenerateInvoiceRequest, InvoiceResponse};
use crate::dto::call::CallRecordResponse;
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};
use voxbill_core::models::InvoiceStatus;
use voxbill_core::traits::{CallRepository, InvoiceRepository};
use voxbill_core::AppError;
use voxbill_db::{PgCallRepository, PgCostRepository, PgInvoiceRepository};
use voxbill_services::InvoiceGenerator;

/// Generate an invoice for an account over a period
///
/// POST /api/v1/invoices/accounts/{id}/generate
///
/// A period with nothing outstanding returns 200 with null data; the
/// operation is idempotent.
#[instrument(skip(pool, req))]
pub async fn generate_invoice(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    req: web::Json<GenerateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    if req.period_end < req.period_start {
        return Err(AppError::Validation(
            "Period end must not precede period start".to_string(),
        ));
    }

    let generator = InvoiceGenerator::new(
        Arc::new(PgCostRepository::new(pool.get_ref().clone())),
        pool.get_ref().clone(),
    );

    let invoice = generator
        .generate_invoice(account_id, req.period_start, req.period_end)
        .await?;

    match invoice {
        Some(invoice) => {
            info!(
                "Generated invoice {} for account {} (total {})",
                invoice.id, account_id, invoice.total
            );
            Ok(HttpResponse::Created()
                .json(ApiResponse::success(Some(InvoiceResponse::from(invoice)))))
        }
        None => Ok(HttpResponse::Ok().json(ApiResponse::with_message(
            None::<InvoiceResponse>,
            "No unbilled records in period",
        ))),
    }
}

/// Preview the unbilled answered records a generation run would claim
///
/// GET /api/v1/invoices/accounts/{id}/unbilled
#[instrument(skip(pool, req))]
pub async fn preview_unbilled(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    req: web::Query<GenerateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let repo = PgCallRepository::new(pool.get_ref().clone());
    let records = repo
        .find_unbilled_answered(account_id, req.period_start, req.period_end)
        .await?;

    let response: Vec<CallRecordResponse> = records.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Get an invoice with its line items
///
/// GET /api/v1/invoices/{id}
#[instrument(skip(pool))]
pub async fn get_invoice(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let invoice_id = path.into_inner();

    let repo = PgInvoiceRepository::new(pool.get_ref().clone());
    let invoice = repo
        .find_by_id(invoice_id)
        .await?
        .ok_or_else(|| AppError::InvoiceNotFound(invoice_id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(InvoiceResponse::from(invoice))))
}

/// List an account's invoices
///
/// GET /api/v1/invoices/accounts/{id}
#[instrument(skip(pool))]
pub async fn list_account_invoices(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let repo = PgInvoiceRepository::new(pool.get_ref().clone());
    let invoices = repo.list_by_account(account_id).await?;

    let response: Vec<InvoiceResponse> = invoices.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Mark an invoice paid after external payment confirmation
///
/// POST /api/v1/invoices/{id}/mark-paid
#[instrument(skip(pool))]
pub async fn mark_paid(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let invoice_id = path.into_inner();

    let repo = PgInvoiceRepository::new(pool.get_ref().clone());
    let invoice = repo.update_status(invoice_id, InvoiceStatus::Paid).await?;

    info!("Invoice {} marked paid", invoice_id);
    Ok(HttpResponse::Ok().json(ApiResponse::success(InvoiceResponse::from(invoice))))
}

/// Configure invoice routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoices")
            .route("/accounts/{id}", web::get().to(list_account_invoices))
            .route("/accounts/{id}/generate", web::post().to(generate_invoice))
            .route("/accounts/{id}/unbilled", web::get().to(preview_unbilled))
            .route("/{id}", web::get().to(get_invoice))
            .route("/{id}/mark-paid", web::post().to(mark_paid)),
    );
}
