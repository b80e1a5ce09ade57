//! Account handlers
//!
//! HTTP handlers for tenant-tree account endpoints. Parent changes are
//! gated through the hierarchy directory's cycle check before any write.

use crate::dto::account::{AccountCreateRequest, AccountResponse, AccountUpdateRequest};
use crate::dto::{ApiResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;
use voxbill_core::models::{Account, AccountRole, BillingType};
use voxbill_core::traits::{AccountRepository, Repository};
use voxbill_core::AppError;
use voxbill_db::{PgAccountRepository, PgCallRepository, PgWalletRepository};
use voxbill_services::HierarchyDirectory;

/// Build the hierarchy directory over the request's pool
fn directory(
    pool: &PgPool,
) -> HierarchyDirectory<PgAccountRepository, PgCallRepository, PgWalletRepository> {
    HierarchyDirectory::new(
        Arc::new(PgAccountRepository::new(pool.clone())),
        Arc::new(PgCallRepository::new(pool.clone())),
        Arc::new(PgWalletRepository::new(pool.clone())),
    )
}

/// List accounts
///
/// GET /api/v1/accounts
#[instrument(skip(pool))]
pub async fn list_accounts(
    pool: web::Data<PgPool>,
    params: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    params.validate().map_err(AppError::from)?;
    debug!("Listing accounts page {}", params.page);

    let repo = PgAccountRepository::new(pool.get_ref().clone());
    let accounts = repo.find_all(params.limit(), params.offset()).await?;

    let response: Vec<AccountResponse> = accounts.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Get a single account
///
/// GET /api/v1/accounts/{id}
#[instrument(skip(pool))]
pub async fn get_account(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    debug!(id = account_id, "Getting account");

    let repo = PgAccountRepository::new(pool.get_ref().clone());
    let account = repo
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(AccountResponse::from(account))))
}

/// Create an account
///
/// POST /api/v1/accounts
#[instrument(skip(pool, req))]
pub async fn create_account(
    pool: web::Data<PgPool>,
    req: web::Json<AccountCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Account creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let role = AccountRole::from_str(&req.role)
        .ok_or_else(|| AppError::Validation(format!("Invalid role: {}", req.role)))?;
    let billing_type = BillingType::from_str(&req.billing_type)
        .ok_or_else(|| AppError::Validation(format!("Invalid billing type: {}", req.billing_type)))?;

    let repo = Arc::new(PgAccountRepository::new(pool.get_ref().clone()));
    let dir = directory(pool.get_ref());

    // A new account under a parent inherits that subtree's reseller root
    let reseller_id = match req.parent_id {
        Some(parent_id) => {
            repo.find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::AccountNotFound(parent_id.to_string()))?;
            dir.root_reseller_id(parent_id).await?
        }
        None => None,
    };

    let account = Account {
        name: req.name.clone(),
        role,
        parent_id: req.parent_id,
        reseller_id,
        max_concurrent_calls: req.max_concurrent_calls,
        billing_type,
        per_channel_rate: req.per_channel_rate,
        plan_id: req.plan_id,
        country_code: req.country_code.clone(),
        tax_id: req.tax_id.clone(),
        ..Default::default()
    };

    let created = repo.create(&account).await?;
    info!("Created account {} ({})", created.id, created.name);

    Ok(HttpResponse::Created().json(ApiResponse::success(AccountResponse::from(created))))
}

/// Update an account
///
/// PUT /api/v1/accounts/{id}
///
/// A parent change is validated by `can_reparent` first; a rejected
/// reparent leaves the account untouched.
#[instrument(skip(pool, req))]
pub async fn update_account(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
    req: web::Json<AccountUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    req.validate().map_err(AppError::from)?;

    let repo = Arc::new(PgAccountRepository::new(pool.get_ref().clone()));
    let mut account = repo
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

    // Reparent first: it is the only mutation with a structural gate
    if let Some(new_parent) = req.parent_id {
        if account.parent_id != Some(new_parent) {
            let dir = directory(pool.get_ref());

            repo.find_by_id(new_parent)
                .await?
                .ok_or_else(|| AppError::AccountNotFound(new_parent.to_string()))?;

            if !dir.can_reparent(account_id, new_parent).await? {
                warn!(
                    "Rejected reparent of {} under {}: cycle or self",
                    account_id, new_parent
                );
                return Err(AppError::HierarchyIntegrity(format!(
                    "Account {} cannot become a child of {}",
                    account_id, new_parent
                )));
            }

            account = repo.update_parent(account_id, Some(new_parent)).await?;
            account.reseller_id = dir.root_reseller_id(new_parent).await?;
        }
    }

    if let Some(name) = &req.name {
        account.name = name.clone();
    }
    if let Some(max) = req.max_concurrent_calls {
        account.max_concurrent_calls = max;
    }
    if let Some(billing_type) = &req.billing_type {
        account.billing_type = BillingType::from_str(billing_type)
            .ok_or_else(|| AppError::Validation(format!("Invalid billing type: {}", billing_type)))?;
    }
    if let Some(rate) = req.per_channel_rate {
        account.per_channel_rate = rate;
    }
    if req.plan_id.is_some() {
        account.plan_id = req.plan_id;
    }
    if req.country_code.is_some() {
        account.country_code = req.country_code.clone();
    }
    if req.tax_id.is_some() {
        account.tax_id = req.tax_id.clone();
    }

    let updated = repo.update(&account).await?;
    info!("Updated account {}", updated.id);

    Ok(HttpResponse::Ok().json(ApiResponse::success(AccountResponse::from(updated))))
}

/// Delete an account
///
/// DELETE /api/v1/accounts/{id}
#[instrument(skip(pool))]
pub async fn delete_account(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let repo = PgAccountRepository::new(pool.get_ref().clone());
    let deleted = repo.delete(account_id).await?;

    if !deleted {
        return Err(AppError::AccountNotFound(account_id.to_string()));
    }

    info!("Deleted account {}", account_id);
    Ok(HttpResponse::NoContent().finish())
}

/// List an account's descendants
///
/// GET /api/v1/accounts/{id}/descendants
#[instrument(skip(pool))]
pub async fn list_descendants(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let dir = directory(pool.get_ref());
    let mut ids: Vec<i32> = dir.descendant_ids(account_id).await?.into_iter().collect();
    ids.sort_unstable();

    Ok(HttpResponse::Ok().json(ApiResponse::success(ids)))
}

/// Resolve an account's reseller root
///
/// GET /api/v1/accounts/{id}/reseller
#[instrument(skip(pool))]
pub async fn get_reseller_root(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();

    let dir = directory(pool.get_ref());
    let reseller_id = dir.root_reseller_id(account_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(reseller_id)))
}

/// Configure account routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/accounts")
            .route("", web::get().to(list_accounts))
            .route("", web::post().to(create_account))
            .route("/{id}", web::get().to(get_account))
            .route("/{id}", web::put().to(update_account))
            .route("/{id}", web::delete().to(delete_account))
            .route("/{id}/descendants", web::get().to(list_descendants))
            .route("/{id}/reseller", web::get().to(get_reseller_root)),
    );
}
