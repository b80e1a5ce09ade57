//! Common traits for repositories and services
//!
//! Defines abstractions for database access and business logic.

use crate::error::AppError;
use crate::models::{
    Account, CallRecord, CostEntry, Invoice, InvoiceStatus, Payment, PricingPlan, Wallet,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Find all entities with pagination
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<T>, AppError>;

    /// Count total entities
    async fn count(&self) -> Result<i64, AppError>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<T, AppError>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<T, AppError>;

    /// Delete entity by ID
    async fn delete(&self, id: ID) -> Result<bool, AppError>;
}

/// Account repository trait with hierarchy and capacity methods
#[async_trait]
pub trait AccountRepository: Repository<Account, i32> {
    /// Find the direct children of an account
    async fn find_by_parent(&self, parent_id: i32) -> Result<Vec<Account>, AppError>;

    /// Find the ids of an account's direct children
    async fn find_ids_by_parent(&self, parent_id: i32) -> Result<Vec<i32>, AppError>;

    /// Fetch a batch of accounts by id
    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<Account>, AppError>;

    /// Admission check and increment as one conditional update
    ///
    /// Increments `active_calls` only while it is below
    /// `max_concurrent_calls`. Returns false when the pool is full.
    async fn try_start_call(&self, id: i32) -> Result<bool, AppError>;

    /// Decrement `active_calls`, clamped at zero
    ///
    /// Returns false when the counter was already zero (the caller logs
    /// the anomaly; the account state is untouched).
    async fn end_call(&self, id: i32) -> Result<bool, AppError>;

    /// Reassign an account's parent
    ///
    /// Callers MUST gate this through `HierarchyDirectory::can_reparent`;
    /// this method performs no cycle check of its own.
    async fn update_parent(&self, id: i32, parent_id: Option<i32>) -> Result<Account, AppError>;
}

/// Cost catalog repository trait
#[async_trait]
pub trait CostRepository: Repository<CostEntry, i32> {
    /// Find the entry for a dialed number using longest prefix match
    async fn find_by_destination(&self, destination: &str) -> Result<Option<CostEntry>, AppError>;

    /// All entries ordered by destination name
    async fn list_by_name(&self) -> Result<Vec<CostEntry>, AppError>;

    /// All entries ordered by code length descending (prefix-match order)
    async fn list_for_matching(&self) -> Result<Vec<CostEntry>, AppError>;
}

/// Pricing plan repository trait
#[async_trait]
pub trait PlanRepository: Repository<PricingPlan, i32> {
    /// Find a plan by its unique name
    async fn find_by_name(&self, name: &str) -> Result<Option<PricingPlan>, AppError>;

    /// The platform's predefined 0%-markup default plan, if seeded
    async fn find_default(&self) -> Result<Option<PricingPlan>, AppError>;

    /// All active plans
    async fn list_active(&self) -> Result<Vec<PricingPlan>, AppError>;
}

/// Usage totals over a set of call records
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageTotals {
    pub calls: i64,
    pub minutes: Decimal,
    pub cost: Decimal,
}

/// Call record repository trait
#[async_trait]
pub trait CallRepository: Repository<CallRecord, i64> {
    /// Unbilled answered records for an account within a period
    async fn find_unbilled_answered(
        &self,
        account_id: i32,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, AppError>;

    /// Today's usage totals across a set of accounts
    async fn usage_today(&self, account_ids: &[i32]) -> Result<UsageTotals, AppError>;

    /// List records with filtering
    async fn list_filtered(
        &self,
        account_id: Option<i32>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CallRecord>, i64), AppError>;
}

/// Invoice repository trait
///
/// Invoice creation happens inside the generator's transaction, not
/// through this trait; the repository covers the read side and status
/// transitions.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Find an invoice with its line items
    async fn find_by_id(&self, id: i64) -> Result<Option<Invoice>, AppError>;

    /// List an account's invoices, newest first
    async fn list_by_account(&self, account_id: i32) -> Result<Vec<Invoice>, AppError>;

    /// Transition an invoice's status (payment confirmation, cancellation)
    async fn update_status(&self, id: i64, status: InvoiceStatus) -> Result<Invoice, AppError>;
}

/// Wallet repository trait
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Get the account's wallet, creating a zero-balance one on first access
    async fn get_or_create(&self, account_id: i32, currency: &str) -> Result<Wallet, AppError>;

    /// Credit the wallet unconditionally
    async fn credit(&self, account_id: i32, amount: Decimal) -> Result<Decimal, AppError>;

    /// Debit only if the balance covers the amount, as one conditional update
    ///
    /// Returns false (no mutation) on insufficient funds.
    async fn try_debit(&self, account_id: i32, amount: Decimal) -> Result<bool, AppError>;

    /// Sum of wallet balances across a set of accounts
    async fn balance_total(&self, account_ids: &[i32]) -> Result<Decimal, AppError>;

    /// List an account's payments, newest first
    async fn list_payments(
        &self,
        account_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), AppError>;
}

/// External invoice-rendering collaborator
///
/// Render failures are logged by the caller and never roll back the
/// financial transaction they follow.
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    /// Produce a document for a payment, returning an artifact reference
    async fn render(&self, payment: &Payment) -> Result<String, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 10);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(0, 10); // page 0 becomes 1
        assert_eq!(p.page, 1);

        let p = Pagination::new(1, 2000); // per_page capped at 1000
        assert_eq!(p.per_page, 1000);
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(95, 1, 10);
        assert_eq!(meta.total_pages, 10);

        let meta = PaginationMeta::new(101, 1, 10);
        assert_eq!(meta.total_pages, 11);
    }
}
