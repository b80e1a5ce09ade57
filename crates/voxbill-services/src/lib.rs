//! Business logic services for VoxBill
//!
//! This crate contains all the business logic services that orchestrate
//! the pricing, capacity, and billing operations.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service owns its dependencies (repositories, cache, etc.)
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Comprehensive error handling with AppError
//!
//! # Services
//!
//! - `HierarchyDirectory` - Tenant tree traversal, cycle prevention, rollups
//! - `CapacityManager` - Shared concurrent-call admission control
//! - `RateEngine` - Wholesale cost to sell price conversion with caching
//! - `TaxCalculator` - Jurisdiction-aware tax computation
//! - `WalletService` - Pre-paid ledger: top-ups and deductions
//! - `InvoiceGenerator` - Periodic aggregation of usage records into invoices

pub mod billing;
pub mod capacity;
pub mod hierarchy;
pub mod rating;
pub mod tax;
pub mod wallet;

pub use billing::InvoiceGenerator;
pub use capacity::CapacityManager;
pub use hierarchy::HierarchyDirectory;
pub use rating::RateEngine;
pub use tax::TaxCalculator;
pub use wallet::WalletService;

/// Business logic constants
pub mod constants {
    /// Hard bound on descendant traversal depth
    ///
    /// `can_reparent` prevents cycles structurally; this bound keeps the
    /// traversal terminating even against already-corrupted data.
    pub const MAX_TRAVERSAL_DEPTH: usize = 100;

    /// Maximum parent hops when resolving an account's reseller root
    pub const ROOT_LOOKUP_MAX_HOPS: usize = 10;

    /// Cost entry cache TTL in seconds (5 minutes)
    pub const COST_CACHE_TTL: u64 = 300;

    /// Statistics rollup cache TTL in seconds
    pub const STATS_CACHE_TTL: u64 = 60;

    /// Days until a generated invoice is due
    pub const INVOICE_DUE_DAYS: i64 = 30;

    /// Digits of the dialed number shown in the unmatched-destination label
    pub const FALLBACK_PREFIX_DIGITS: usize = 4;

    /// Decimal places for invoice line quantities and totals
    pub const LINE_PRECISION: u32 = 5;
}
